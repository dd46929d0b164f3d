//! Domain types for the gateway.
//!
//! Pure data and rules: no sockets, no files, no async.  The infrastructure
//! layer of `shelly-gateway` reads the device file from disk and hands the raw
//! JSON text to [`device::DeviceTable::from_json`]; everything downstream of
//! that call works on the types declared here.

/// Relay device records and the table the routes look devices up in.
pub mod device;

/// Commands a route can ask the dispatcher to perform, and trust levels.
pub mod command;
