use crate::types::RuntimeTag;

/// Environment variable whose value `edge` marks an isolated edge runtime.
pub const EDGE_RUNTIME_VAR: &str = "NEXT_RUNTIME";

/// Observations about the host used to pick a [`RuntimeTag`].
pub trait RuntimeProbe {
    /// Whether a browser global object is reachable.
    fn has_browser_global(&self) -> bool;

    /// Whether the edge-runtime environment marker is set.
    fn has_edge_marker(&self) -> bool;
}

/// Probe backed by the real host.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProbe;

impl RuntimeProbe for HostProbe {
    fn has_browser_global(&self) -> bool {
        cfg!(all(target_arch = "wasm32", target_os = "unknown"))
    }

    fn has_edge_marker(&self) -> bool {
        std::env::var(EDGE_RUNTIME_VAR).is_ok_and(|value| value == "edge")
    }
}

/// Pick the runtime. First match wins: the explicit override, then a
/// browser global, then the edge marker, then server-process.
pub fn select(explicit: Option<RuntimeTag>, probe: &dyn RuntimeProbe) -> RuntimeTag {
    if let Some(runtime) = explicit {
        return runtime;
    }

    if probe.has_browser_global() {
        return RuntimeTag::Browser;
    }

    if probe.has_edge_marker() {
        return RuntimeTag::Edge;
    }

    RuntimeTag::ServerProcess
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    struct FixedProbe {
        browser: bool,
        edge: bool,
    }

    impl RuntimeProbe for FixedProbe {
        fn has_browser_global(&self) -> bool {
            self.browser
        }

        fn has_edge_marker(&self) -> bool {
            self.edge
        }
    }

    #[rstest]
    #[case(Some(RuntimeTag::Edge), true, true, RuntimeTag::Edge)]
    #[case(Some(RuntimeTag::ServerProcess), true, false, RuntimeTag::ServerProcess)]
    #[case(None, true, true, RuntimeTag::Browser)]
    #[case(None, false, true, RuntimeTag::Edge)]
    #[case(None, false, false, RuntimeTag::ServerProcess)]
    fn precedence_chain(
        #[case] explicit: Option<RuntimeTag>,
        #[case] browser: bool,
        #[case] edge: bool,
        #[case] expected: RuntimeTag,
    ) {
        let probe = FixedProbe { browser, edge };
        assert_eq!(select(explicit, &probe), expected);
    }
}
