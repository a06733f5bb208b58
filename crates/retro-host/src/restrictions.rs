//! Core option values that must stay off while achievements are active.
//!
//! A rule pairs an option key with a value pattern:
//!   "pal"          one value, compared case-insensitively
//!   ",PAL,Dendy"   any of a comma-separated list
//!   "!..."         anything except what follows
//! A key ending in `*` applies to every option sharing the prefix.

/// One forbidden key/value pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisallowedSetting {
    pub key: &'static str,
    pub value: &'static str,
}

const fn rule(key: &'static str, value: &'static str) -> DisallowedSetting {
    DisallowedSetting { key, value }
}

static CORES: &[(&str, &[DisallowedSetting])] = &[
    ("bsnes-mercury", &[rule("bsnes_region", "pal")]),
    ("dolphin-emu", &[rule("dolphin_cheats_enabled", "enabled")]),
    ("ecwolf", &[rule("ecwolf-invulnerability", "enabled")]),
    ("FCEUmm", &[rule("fceumm_region", ",PAL,Dendy")]),
    ("FinalBurn Neo", &[rule("fbneo-allow-patched-romsets", "enabled"), rule("fbneo-cheat-*", "!,Disabled,0 - Disabled")]),
    ("Genesis Plus GX", &[
        rule("genesis_plus_gx_lock_on", ",action replay (pro),game genie"),
        rule("genesis_plus_gx_region_detect", "pal"),
    ]),
    ("Genesis Plus GX Wide", &[
        rule("genesis_plus_gx_wide_lock_on", ",action replay (pro),game genie"),
        rule("genesis_plus_gx_wide_region_detect", "pal"),
    ]),
    ("Mesen", &[rule("mesen_region", ",PAL,Dendy")]),
    ("Mesen-S", &[rule("mesen-s_region", "PAL")]),
    ("PPSSPP", &[rule("ppsspp_cheats", "enabled")]),
    ("PCSX-ReARMed", &[rule("pcsx_rearmed_region", "pal")]),
    ("PicoDrive", &[rule("picodrive_region", ",Europe,Japan PAL")]),
    ("Snes9x", &[rule("snes9x_region", "pal")]),
    ("Virtual Jaguar", &[rule("virtualjaguar_pal", "enabled")]),
];

/// Rules for the core reporting `library_name`; the name must match exactly.
pub fn disallowed_settings(library_name: &str) -> Option<&'static [DisallowedSetting]> {
    if library_name.is_empty() { return None; }
    CORES.iter().find(|(name, _)| *name == library_name).map(|(_, rules)| *rules)
}

fn value_matches(value: &str, pattern: &str) -> bool {
    if let Some(list) = pattern.strip_prefix(',') {
        return list.split(',').any(|candidate| candidate.eq_ignore_ascii_case(value));
    }
    if let Some(rest) = pattern.strip_prefix('!') {
        return !value_matches(value, rest);
    }
    value.eq_ignore_ascii_case(pattern)
}

/// Whether `key` may be set to `value` under `rules`.
pub fn is_setting_allowed(rules: &[DisallowedSetting], key: &str, value: &str) -> bool {
    !rules.iter().any(|r| {
        let applies = match r.key.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == r.key,
        };
        applies && value_matches(value, r.value)
    })
}
