/// `GET /health` -- liveness probe, no auth.
pub async fn health() -> &'static str {
    "OK"
}
