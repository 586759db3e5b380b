//! Ordered routing of change requests to handlers by property name.

/// A name-to-route table evaluated in declaration order.
///
/// Devices declare their routes from highest to lowest precedence. When a
/// request names a property more than one route would claim, the first
/// declared route wins.
#[derive(Debug, Clone)]
pub struct DispatchTable<R> {
    routes: Vec<(String, R)>,
}

impl<R: Copy> DispatchTable<R> {
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    #[must_use]
    pub fn route(mut self, property: impl Into<String>, route: R) -> Self {
        self.routes.push((property.into(), route));
        self
    }

    /// First route registered for `property`.
    #[must_use]
    pub fn resolve(&self, property: &str) -> Option<R> {
        self.routes
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, route)| *route)
    }
}

impl<R: Copy> Default for DispatchTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Route {
        Connection,
        Domain,
        Config,
    }

    #[test]
    fn should_resolve_declared_route() {
        let table = DispatchTable::new()
            .route("CONNECTION", Route::Connection)
            .route("CONFIG", Route::Config);
        assert_eq!(table.resolve("CONFIG"), Some(Route::Config));
    }

    #[test]
    fn should_return_none_for_unknown_property() {
        let table = DispatchTable::new().route("CONNECTION", Route::Connection);
        assert_eq!(table.resolve("NOPE"), None);
    }

    #[test]
    fn should_prefer_first_declared_route() {
        let table = DispatchTable::new()
            .route("CONNECTION", Route::Connection)
            .route("CONNECTION", Route::Domain);
        assert_eq!(table.resolve("CONNECTION"), Some(Route::Connection));
    }
}
