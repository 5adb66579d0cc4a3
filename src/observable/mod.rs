// 観測可能な列挙 - ライフサイクルイベントとリスナーレジストリ

pub mod enumerator;
pub mod events;
pub mod registry;

pub use enumerator::{Observation, ObservableEnumerator};
pub use events::{EnumerationEnded, EnumerationItem, EnumerationStarted};
pub use registry::{ListenerId, ObservationListeners};
