//! Frame buffer settings from an INI file

use std::path::Path;
use ini::{Ini, Properties};
use num_traits::FromPrimitive;
use tracing::warn;
use fbdetect_lib::{FbSettings, SwapMode};
use crate::error::Result;

const SECTION: &str = "FrameBuffer";

pub fn load(path: &Path) -> Result<FbSettings> {
    let ini = Ini::load_from_file(path)?;

    Ok(from_ini(&ini))
}

/// Like `load`, but a missing or broken file only costs a warning
pub fn load_or_default(path: Option<&Path>) -> FbSettings {
    let Some(path) = path else {
        return FbSettings::default();
    };

    match load(path) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("{}: {}, using default settings", path.display(), e);
            FbSettings::default()
        }
    }
}

pub fn from_ini(ini: &Ini) -> FbSettings {
    let mut settings = FbSettings::default();

    let Some(section) = ini.section(Some(SECTION)) else {
        warn!("No [{}] section, using default settings", SECTION);
        return settings;
    };

    read_flag(section, "hires", &mut settings.fb_hires);
    read_flag(section, "ignore_aux_copy", &mut settings.fb_ignore_aux_copy);
    read_flag(section, "pm", &mut settings.pm);

    match section.get("swap_mode") {
        Some(v) => match v.trim().parse::<u32>().ok().and_then(SwapMode::from_u32) {
            Some(mode) => settings.swap_mode = mode,
            None => warn!("Invalid swap_mode {}, using {:?}", v, settings.swap_mode),
        },
        None => warn!("swap_mode not set, using {:?}", settings.swap_mode),
    }

    for (key, _) in section.iter() {
        if !matches!(key, "hires" | "ignore_aux_copy" | "pm" | "swap_mode") {
            warn!("Unknown key [{}] {}", SECTION, key);
        }
    }

    settings
}

fn read_flag(section: &Properties, key: &str, flag: &mut bool) {
    let Some(v) = section.get(key) else {
        warn!("{} not set, using {}", key, flag);
        return;
    };

    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => *flag = true,
        "0" | "false" | "no" | "off" => *flag = false,
        _ => warn!("Invalid value for {}: {}", key, v),
    }
}
