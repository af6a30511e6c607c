//! Page controllers: the fixed statements behind each dashboard page.
//!
//! Every function runs on a connection leased by the caller and returns typed
//! rows; none of them owns a connection or touches session state.

pub mod batches;
pub mod deliveries;
pub mod orders;
pub mod session_registry;
pub mod tables;

/// `$start, $start+1, ...` for `count` bound values, used to build `IN (...)` lists.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Distribution center of a batch: the one it was registered at, else the
/// first center stocking its product.
pub(crate) const BATCH_CENTER_SQL: &str = "COALESCE(pb.center_name, \
     (SELECT MIN(dcp.center_name) FROM distribution_center_product dcp \
      WHERE dcp.serial_no = pb.serial_no))";
