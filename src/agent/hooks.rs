// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The agent's server-adapter hook and the platform server it instruments.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::HookError;
use crate::shim::{HookModule, HookValue, ModuleIdentity};

/// Attribute the agent calls when the server's config object is created.
pub const INSTRUMENT_SERVER: &str = "instrument_server";

/// Attributes the real hook exposes.
const ATTRS: &[&str] = &[INSTRUMENT_SERVER, "wrap_connection", "wrap_thread_pool"];

/// The hosting platform's network server, as far as the hook can see it.
///
/// The platform owns the bootstrap; this only tracks whether it has begun.
#[derive(Debug, Default)]
pub struct PlatformServer {
    bootstrapped: AtomicBool,
}

impl PlatformServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the platform when it starts building its server.
    pub fn begin_bootstrap(&self) {
        self.bootstrapped.store(true, Ordering::SeqCst);
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.load(Ordering::SeqCst)
    }
}

/// The real server-adapter hook.
///
/// It expects to own the server's initialization object, so it fails once the
/// platform has started that initialization itself.
#[derive(Debug)]
pub struct ServerAdapterHook {
    identity: ModuleIdentity,
    server: Arc<PlatformServer>,
    instrumented: AtomicBool,
}

impl ServerAdapterHook {
    pub fn new(identity: ModuleIdentity, server: Arc<PlatformServer>) -> Self {
        Self {
            identity,
            server,
            instrumented: AtomicBool::new(false),
        }
    }

    pub fn is_instrumented(&self) -> bool {
        self.instrumented.load(Ordering::SeqCst)
    }
}

impl HookModule for ServerAdapterHook {
    fn identity(&self) -> &ModuleIdentity {
        &self.identity
    }

    fn has_attr(&self, attr: &str) -> bool {
        ATTRS.contains(&attr)
    }

    fn invoke(&self, attr: &str, _args: &[HookValue]) -> Result<HookValue, HookError> {
        match attr {
            INSTRUMENT_SERVER => {
                if self.server.is_bootstrapped() {
                    return Err(HookError::ServerAlreadyBootstrapped(
                        "server config object is owned by the platform".to_string(),
                    ));
                }
                self.instrumented.store(true, Ordering::SeqCst);
                Ok(HookValue::Bool(true))
            }
            "wrap_connection" | "wrap_thread_pool" => Ok(HookValue::Unit),
            other => Err(HookError::UnknownAttribute {
                module: self.identity.to_string(),
                attr: other.to_string(),
            }),
        }
    }
}
