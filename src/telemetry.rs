#[cfg(feature = "metrics")]
pub(crate) fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn metric_inc(_name: &'static str) {}

#[cfg(feature = "metrics")]
pub(crate) fn metric_inc_route(name: &'static str, route: &str) {
    metrics::increment_counter!(name, "route" => route.to_string());
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn metric_inc_route(_name: &'static str, _route: &str) {}

#[cfg(feature = "metrics")]
pub(crate) fn metric_inc_outcome(name: &'static str, route: &str, outcome: &'static str) {
    metrics::increment_counter!(name, "route" => route.to_string(), "outcome" => outcome);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn metric_inc_outcome(_name: &'static str, _route: &str, _outcome: &'static str) {}
