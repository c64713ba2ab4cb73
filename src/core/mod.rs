pub mod network;
pub mod selector;

pub use selector::{
    InteractiveChooser, Resolution, SelectedProfile, SelectionError, SelectionOutcome,
    SelectionSource, Selector,
};
