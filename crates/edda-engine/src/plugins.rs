//! Plugin hook surface.

use crate::selection::SelectionSnapshot;

/// Extension point notified after the editor's own selection callback, in
/// registration order. Implementations must not assume the snapshot stays
/// current past the call.
pub trait Plugin {
    fn on_selection_change(&mut self, _snapshot: &SelectionSnapshot) {}
}
