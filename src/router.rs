//! Route descriptors and the read-only table over them.
//!
//! The table is an ordered list, consulted in registration order. Overlapping
//! routes are all returned: a dispatch runs the first match's stages and, if
//! they all proceed, falls through to the next match. Nothing here is mutated
//! after [`RouteTable::new`].

use tracing::warn;

use crate::context::split_url;
use crate::error::{ConfigError, DispatchError};
use crate::handler::Stage;
use crate::method::Method;
use crate::middleware::Chain;
use crate::pattern::PathPattern;
use crate::request::Params;

/// A registered route: method, pattern, capture names and stages.
#[derive(Clone, Debug)]
pub struct RouteDescriptor {
    method: Method,
    pattern: PathPattern,
    param_names: Vec<String>,
    stages: Vec<Stage>,
}

impl RouteDescriptor {
    /// Builds a descriptor from a template; capture names come from the template.
    ///
    /// ```rust
    /// use murmur::{Exchange, Method, RouteDescriptor, Stage, Step};
    ///
    /// async fn show(ex: Exchange) -> Step {
    ///     let id = ex.request.params().get("id").unwrap_or_default().to_owned();
    ///     ex.response.send(id)
    /// }
    ///
    /// let route = RouteDescriptor::new(Method::Get, "/users/:id", vec![Stage::middleware(show)]).unwrap();
    /// assert_eq!(route.param_names(), ["id"]);
    /// ```
    pub fn new(method: Method, template: &str, stages: Vec<Stage>) -> Result<Self, ConfigError> {
        let pattern = PathPattern::parse(template)?;
        let param_names = pattern.capture_names();
        Self::from_parts(method, pattern, param_names, stages)
    }

    /// Builds a descriptor from an already compiled pattern and its capture names.
    ///
    /// Fails unless there is exactly one name per capturing group.
    pub fn from_parts(
        method: Method,
        pattern: PathPattern,
        param_names: Vec<String>,
        stages: Vec<Stage>,
    ) -> Result<Self, ConfigError> {
        if param_names.len() != pattern.capture_count() {
            return Err(ConfigError::ParamCountMismatch {
                template: pattern.template().to_owned(),
                names: param_names.len(),
                captures: pattern.capture_count(),
            });
        }
        Ok(Self { method, pattern, param_names, stages })
    }

    pub fn method(&self) -> Method { self.method }
    pub fn pattern(&self) -> &PathPattern { &self.pattern }
    pub fn param_names(&self) -> &[String] { &self.param_names }
    pub fn stages(&self) -> &[Stage] { &self.stages }

    /// Binds this route's capture names against `path` (no query string).
    pub(crate) fn bind(&self, path: &str) -> Result<Params, DispatchError> {
        self.pattern.bind(path, &self.param_names).ok_or_else(|| {
            warn!(path, template = self.pattern.template(), "path does not line up with route");
            DispatchError::PathMismatch {
                path: path.to_owned(),
                template: self.pattern.template().to_owned(),
            }
        })
    }
}

/// A descriptor with its stages already split by role.
pub(crate) struct CompiledRoute {
    pub(crate) descriptor: RouteDescriptor,
    pub(crate) chain: Chain,
}

/// The route table.
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteDescriptor>) -> Self {
        let routes = routes
            .into_iter()
            .map(|descriptor| {
                let chain = Chain::classify(descriptor.stages());
                CompiledRoute { descriptor, chain }
            })
            .collect();
        Self { routes }
    }

    /// Every descriptor whose method and pattern accept the request, in
    /// registration order. Method comparison ignores case; the query string is
    /// ignored. Empty when nothing matches.
    pub fn matches(&self, method: &str, path: &str) -> Vec<&RouteDescriptor> {
        self.lookup(method, path).into_iter().map(|r| &r.descriptor).collect()
    }

    pub(crate) fn lookup(&self, method: &str, path: &str) -> Vec<&CompiledRoute> {
        let Ok(method) = method.parse::<Method>() else {
            return Vec::new();
        };
        let (base, _) = split_url(path);
        self.routes
            .iter()
            .filter(|r| r.descriptor.method == method && r.descriptor.pattern.accepts(base))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
