//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Compile the contract's HTTP rules into MethodBindings
//! - Reject ambiguous or invalid bindings at build time
//! - Look up the binding for a request, or return an explicit not-found
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Bindings are stored most-specific first, so the first match wins
//! - Specificity: more literal segments, then earlier literals, then
//!   declaration order
//! - O(n) scan (acceptable for a single service's routes)

use std::cmp::Reverse;

use axum::http::{Method, StatusCode};

use crate::contract::{BodyMapping, MethodDescriptor, ServiceDescriptor};
use crate::routing::matcher::{PathTemplate, TemplateError};

/// One REST route of an RPC method.
#[derive(Debug, Clone)]
pub struct MethodBinding {
    pub rpc_method: &'static MethodDescriptor,
    pub http_method: Method,
    pub template: PathTemplate,
    pub body: BodyMapping,
    pub success_status: StatusCode,
    order: usize,
}

impl MethodBinding {
    pub fn rpc_name(&self) -> &'static str {
        self.rpc_method.name
    }
}

/// A resolved request: the binding plus the extracted path parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub binding: &'a MethodBinding,
    pub params: Vec<(String, String)>,
}

/// Build-time routing errors.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("{rpc_method}: invalid path template `{path}`: {source}")]
    InvalidTemplate {
        rpc_method: &'static str,
        path: &'static str,
        #[source]
        source: TemplateError,
    },
    #[error("{rpc_method}: path parameter `{field}` is not a field of {message}")]
    UnknownPathField {
        rpc_method: &'static str,
        field: String,
        message: &'static str,
    },
    #[error("{rpc_method}: path parameter `{field}` must bind a scalar field")]
    NonScalarPathField { rpc_method: &'static str, field: String },
    #[error("{rpc_method}: body field `{field}` is not a field of {message}")]
    UnknownBodyField {
        rpc_method: &'static str,
        field: &'static str,
        message: &'static str,
    },
    #[error("ambiguous routes: {method} {first} ({first_rpc}) and {method} {second} ({second_rpc})")]
    Conflict {
        method: Method,
        first: String,
        first_rpc: &'static str,
        second: String,
        second_rpc: &'static str,
    },
}

/// No binding matches the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no route for {method} {path}")]
pub struct RouteNotFound {
    pub method: Method,
    pub path: String,
}

/// Immutable table of MethodBindings, most specific first.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    bindings: Vec<MethodBinding>,
}

fn compile(
    method: &'static MethodDescriptor,
    order: usize,
    rule: &crate::contract::HttpRule,
) -> Result<MethodBinding, RouteError> {
    let template = PathTemplate::parse(rule.path).map_err(|source| RouteError::InvalidTemplate {
        rpc_method: method.name,
        path: rule.path,
        source,
    })?;

    for param in template.params() {
        let field = method
            .request
            .field_path(param)
            .ok_or_else(|| RouteError::UnknownPathField {
                rpc_method: method.name,
                field: param.to_string(),
                message: method.request.name,
            })?;
        if !field.kind.is_scalar() {
            return Err(RouteError::NonScalarPathField {
                rpc_method: method.name,
                field: param.to_string(),
            });
        }
    }

    if let BodyMapping::Field(name) = rule.body {
        if method.request.field(name).is_none() {
            return Err(RouteError::UnknownBodyField {
                rpc_method: method.name,
                field: name,
                message: method.request.name,
            });
        }
    }

    Ok(MethodBinding {
        rpc_method: method,
        http_method: rule.verb.as_method(),
        template,
        body: rule.body,
        success_status: rule.success_status,
        order,
    })
}

impl RoutingTable {
    /// Compile every HTTP rule of the service.
    pub fn build(service: &'static ServiceDescriptor) -> Result<Self, RouteError> {
        let mut bindings = Vec::new();
        for method in service.methods {
            for rule in method.http {
                let order = bindings.len();
                bindings.push(compile(method, order, rule)?);
            }
        }

        for (i, first) in bindings.iter().enumerate() {
            for second in &bindings[i + 1..] {
                if first.http_method == second.http_method
                    && first.template.same_shape(&second.template)
                {
                    return Err(RouteError::Conflict {
                        method: first.http_method.clone(),
                        first: first.template.to_string(),
                        first_rpc: first.rpc_name(),
                        second: second.template.to_string(),
                        second_rpc: second.rpc_name(),
                    });
                }
            }
        }

        bindings.sort_by_key(|b| (Reverse(b.template.literal_count()), b.template.shape_key(), b.order));

        for binding in &bindings {
            tracing::debug!(
                http_method = %binding.http_method,
                path = %binding.template,
                rpc_method = binding.rpc_name(),
                "Route registered"
            );
        }

        Ok(Self { bindings })
    }

    /// Find the most specific binding for a request.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<RouteMatch<'_>, RouteNotFound> {
        self.bindings
            .iter()
            .filter(|b| b.http_method == *method)
            .find_map(|binding| {
                binding
                    .template
                    .matches(path)
                    .map(|params| RouteMatch { binding, params })
            })
            .ok_or_else(|| RouteNotFound {
                method: method.clone(),
                path: path.to_string(),
            })
    }

    /// Bindings in match order.
    pub fn bindings(&self) -> &[MethodBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
