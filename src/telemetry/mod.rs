// Telemetry side: the external feed that lands in the same store the control
// loop works on. Wire codec, operator endpoint parsing, the ingestion client
// and the synthetic single-peer server used to exercise it.

pub mod endpoint;
pub mod codec;
pub mod ingest;
pub mod server;
