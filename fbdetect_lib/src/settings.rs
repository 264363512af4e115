//! Frame buffer emulation options. These belong to the frontend: the detector consults them but
//! never changes them.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

#[derive(serde::Serialize, serde::Deserialize, Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct FbSettings {
    /// Enable the hi-res render target heuristics
    pub fb_hires: bool,
    /// Never classify narrower copies of the main buffer as `aux_copy`
    pub fb_ignore_aux_copy: bool,
    /// Alternate presentation mode
    pub pm: bool,
    /// Display swap strategy
    pub swap_mode: SwapMode,
}

#[derive(serde::Serialize, serde::Deserialize, Copy, Clone, PartialEq, Eq, Debug, Default, FromPrimitive)]
#[repr(u8)]
pub enum SwapMode {
    /// Swap as soon as a new main buffer is seen
    Immediate = 0,
    /// Swap on vertical interrupt
    #[default]
    OnVi = 1,
    /// Swap on vertical interrupt, but only if the VI origin register moved since the last swap
    OnViOriginChange = 2,
}

impl SwapMode {
    /// Convert the raw selector used in configuration files
    pub fn from_selector(selector: u32) -> Option<SwapMode> {
        SwapMode::from_u32(selector)
    }
}

#[test]
fn swap_mode_selector() {
    assert_eq!(SwapMode::from_selector(0), Some(SwapMode::Immediate));
    assert_eq!(SwapMode::from_selector(2), Some(SwapMode::OnViOriginChange));
    assert_eq!(SwapMode::from_selector(3), None);
    assert_eq!(FbSettings::default().swap_mode, SwapMode::OnVi);
}
