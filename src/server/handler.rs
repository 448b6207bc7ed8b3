//! Route registration and lookup.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::parser::{HttpRequest, Method};
use crate::server::{Error, HttpResponse};

/// Type alias for a shared handler function.
///
/// A handler fills in the response it is given. Returning an error, like panicking,
/// makes the connection answer with a 500.
pub type HandlerFn = Arc<dyn Fn(&mut HttpResponse, &mut HttpRequest) -> Result<(), Error> + Send + Sync>;

/// The parsed form of a registration string: `"<path>"` or `"<METHOD> <path>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// The path to match exactly.
    pub path: String,
    /// The methods the pattern applies to.
    pub methods: Vec<Method>,
}

impl Pattern {
    /// Parse a registration pattern.
    ///
    /// A bare path applies to every supported method; a `METHOD path` pair applies to
    /// that method only.
    pub fn parse(pattern: &str) -> Result<Self, Error> {
        if pattern.is_empty() {
            return Err(Error::EmptyPattern);
        }

        let chunks: Vec<&str> = pattern.split(' ').collect();
        let (methods, path) = match chunks.as_slice() {
            [path] => (Method::ALL.to_vec(), *path),
            [method, path] => {
                let method = method
                    .parse::<Method>()
                    .map_err(|_| Error::UnsupportedMethod(method.to_string()))?;
                (vec![method], *path)
            }
            _ => return Err(Error::InvalidPattern(pattern.to_string())),
        };

        if path.is_empty() {
            return Err(Error::InvalidPattern(pattern.to_string()));
        }

        Ok(Self {
            path: path.to_string(),
            methods,
        })
    }
}

/// A registered path: the handler for each method it accepts.
#[derive(Clone, Default)]
pub struct Route {
    handlers: BTreeMap<Method, HandlerFn>,
}

impl Route {
    /// The methods this route accepts, in a stable order.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        self.handlers.keys().copied()
    }

    /// The handler registered for `method`.
    pub fn handler(&self, method: Method) -> Option<&HandlerFn> {
        self.handlers.get(&method)
    }
}

/// The outcome of resolving a request against the registry.
pub enum RouteMatch {
    /// A handler accepts the path and method.
    Found(HandlerFn),
    /// Nothing is registered for the path.
    NotFound,
    /// The path exists but does not accept the method.
    MethodNotAllowed,
}

/// The route registry.
///
/// Paths map to routes and match exactly. Registration takes the write lock and
/// lookups take the read lock; methods are only ever added to a route.
#[derive(Clone, Default)]
pub struct Router {
    routes: Arc<RwLock<HashMap<String, Route>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for a pattern such as `"/users"` or `"GET /users"`.
    ///
    /// Fails if the pattern is malformed or if any of its methods is already
    /// registered for the path; in that case nothing is registered.
    pub async fn register<F>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut HttpResponse, &mut HttpRequest) -> Result<(), Error> + Send + Sync + 'static,
    {
        let pattern = Pattern::parse(pattern)?;
        self.register_pattern(pattern, Arc::new(handler)).await
    }

    /// Register an already parsed pattern.
    pub async fn register_pattern(&self, pattern: Pattern, handler: HandlerFn) -> Result<(), Error> {
        let mut routes = self.routes.write().await;
        let route = routes.entry(pattern.path.clone()).or_default();

        if let Some(method) = pattern.methods.iter().find(|m| route.handlers.contains_key(*m)) {
            return Err(Error::DuplicateRoute {
                method: *method,
                path: pattern.path,
            });
        }

        for method in pattern.methods {
            route.handlers.insert(method, handler.clone());
        }

        Ok(())
    }

    /// Resolve a request path and method token.
    pub async fn lookup(&self, path: &str, method: &str) -> RouteMatch {
        let routes = self.routes.read().await;
        let Some(route) = routes.get(path) else {
            return RouteMatch::NotFound;
        };

        let handler = method.parse::<Method>().ok().and_then(|m| route.handler(m));
        match handler {
            Some(handler) => RouteMatch::Found(handler.clone()),
            None => RouteMatch::MethodNotAllowed,
        }
    }

    /// Every registered path with its methods, sorted by path.
    pub async fn endpoints(&self) -> Vec<(String, Vec<Method>)> {
        let routes = self.routes.read().await;
        let mut endpoints: Vec<(String, Vec<Method>)> = routes
            .iter()
            .map(|(path, route)| (path.clone(), route.methods().collect()))
            .collect();
        endpoints.sort_by(|a, b| a.0.cmp(&b.0));
        endpoints
    }
}
