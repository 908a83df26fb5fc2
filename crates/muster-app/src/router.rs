use std::sync::Arc;

use muster_core::alert::LabelSet;
use muster_core::route::Route;
use muster_ports::outbound::RouteMatcher;

/// Routing tree rooted at a catch-all route.
pub struct RouteTree {
    root: Arc<Route>,
}

impl RouteTree {
    pub fn new(root: Route) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn root(&self) -> &Arc<Route> {
        &self.root
    }
}

impl RouteMatcher for RouteTree {
    /// The root always matches, whatever its matchers say.
    fn match_labels(&self, labels: &LabelSet) -> Vec<Arc<Route>> {
        let mut matches = Vec::new();
        collect(&self.root, labels, &mut matches);
        matches
    }
}

/// Depth-first: the deepest matching routes win over their ancestors.
fn collect(route: &Arc<Route>, labels: &LabelSet, out: &mut Vec<Arc<Route>>) {
    let before = out.len();
    for child in route.routes() {
        if !child.matches(labels) {
            continue;
        }
        collect(child, labels, out);
        if !child.continue_matching() {
            break;
        }
    }
    if out.len() == before {
        out.push(Arc::clone(route));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster_core::route::RouteOpts;

    fn route(receiver: &str, matchers: &[(&str, &str)]) -> Route {
        Route::new(RouteOpts::new(receiver))
            .unwrap()
            .with_matchers(matchers.iter().copied().collect())
    }

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs.iter().copied().collect()
    }

    fn receivers(routes: &[Arc<Route>]) -> Vec<&str> {
        routes.iter().map(|r| r.opts().receiver.as_str()).collect()
    }

    #[test]
    fn root_matches_when_no_child_does() {
        let tree = RouteTree::new(
            route("default", &[]).with_child(route("db-team", &[("service", "db")])),
        );

        let matched = tree.match_labels(&labels(&[("service", "api")]));
        assert_eq!(receivers(&matched), vec!["default"]);
    }

    #[test]
    fn root_matchers_are_ignored() {
        let tree = RouteTree::new(route("default", &[("env", "prod")]));

        let matched = tree.match_labels(&labels(&[("env", "staging")]));
        assert_eq!(receivers(&matched), vec!["default"]);
    }

    #[test]
    fn first_matching_child_wins() {
        let tree = RouteTree::new(
            route("default", &[])
                .with_child(route("db-team", &[("service", "db")]))
                .with_child(route("prod", &[("env", "prod")])),
        );

        let matched = tree.match_labels(&labels(&[("service", "db"), ("env", "prod")]));
        assert_eq!(receivers(&matched), vec!["db-team"]);
    }

    #[test]
    fn continue_lets_later_siblings_match() {
        let tree = RouteTree::new(
            route("default", &[])
                .with_child(route("db-team", &[("service", "db")]).with_continue(true))
                .with_child(route("prod", &[("env", "prod")])),
        );

        let matched = tree.match_labels(&labels(&[("service", "db"), ("env", "prod")]));
        assert_eq!(receivers(&matched), vec!["db-team", "prod"]);
    }

    #[test]
    fn deepest_match_is_returned() {
        let tree = RouteTree::new(
            route("default", &[]).with_child(
                route("db-team", &[("service", "db")])
                    .with_child(route("db-oncall", &[("severity", "critical")])),
            ),
        );

        let critical = tree.match_labels(&labels(&[("service", "db"), ("severity", "critical")]));
        assert_eq!(receivers(&critical), vec!["db-oncall"]);

        let warning = tree.match_labels(&labels(&[("service", "db"), ("severity", "warning")]));
        assert_eq!(receivers(&warning), vec!["db-team"]);
    }

    #[test]
    fn child_requires_all_matchers() {
        let tree = RouteTree::new(
            route("default", &[])
                .with_child(route("db-prod", &[("service", "db"), ("env", "prod")])),
        );

        let matched = tree.match_labels(&labels(&[("service", "db")]));
        assert_eq!(receivers(&matched), vec!["default"]);
    }

    #[test]
    fn matched_routes_are_shared_not_copied() {
        let tree = RouteTree::new(route("default", &[]));

        let first = tree.match_labels(&LabelSet::new());
        let second = tree.match_labels(&LabelSet::new());
        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert!(Arc::ptr_eq(&first[0], tree.root()));
    }
}
