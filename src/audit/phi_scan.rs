// Source scan: tracing calls must never carry patient-entered text or
// identifiers. Logs use opaque ids and counts only.
