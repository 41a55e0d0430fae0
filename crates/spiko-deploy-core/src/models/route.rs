//! HTTP routes served by the deployed edge function.
//!
//! Documentation only: the handlers live in the function bundle.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Route {
    pub method: HttpMethod,
    pub path: &'static str,
    pub summary: &'static str,
    /// Expects `Authorization: Bearer <token>`
    pub requires_auth: bool,
}

impl Route {
    /// Full URL under the function base, e.g. `.../functions/v1/spiko-api/api/me`
    pub fn url(&self, function_base_url: &str) -> String {
        format!("{}{}", function_base_url.trim_end_matches('/'), self.path)
    }
}

pub const ROUTES: &[Route] = &[
    Route {
        method: HttpMethod::Post,
        path: "/api/login",
        summary: "Exchange email and password for an access token",
        requires_auth: false,
    },
    Route {
        method: HttpMethod::Post,
        path: "/api/register",
        summary: "Create an account",
        requires_auth: false,
    },
    Route {
        method: HttpMethod::Get,
        path: "/api/me",
        summary: "Current user profile",
        requires_auth: true,
    },
    Route {
        method: HttpMethod::Post,
        path: "/api/analyze",
        summary: "AI feedback analysis of a speaking transcript",
        requires_auth: true,
    },
    Route {
        method: HttpMethod::Get,
        path: "/api/sessions",
        summary: "Practice session catalogue (also /api/sessions/{id})",
        requires_auth: false,
    },
];
