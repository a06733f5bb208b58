//! Grouping regions into the banks an external consumer registers.

use super::regions::Region;

/// Most banks a consumer accepts.
pub const MAX_BANKS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bank {
    pub mapped: bool,
    pub size: usize,
    pub regions: Vec<Region>,
}

/// Merges runs of consecutive regions sharing the same mapped status. Groups
/// past `MAX_BANKS` are dropped with a warning.
pub fn build_banks(regions: &[Region]) -> Vec<Bank> {
    let mut banks: Vec<Bank> = Vec::new();
    let mut dropped = 0usize;

    for region in regions {
        if dropped == 0 {
            if let Some(bank) = banks.last_mut().filter(|b| b.mapped == region.is_mapped()) {
                bank.size += region.len;
                bank.regions.push(*region);
                continue;
            }
            if banks.len() < MAX_BANKS {
                banks.push(Bank { mapped: region.is_mapped(), size: region.len, regions: vec![*region] });
                continue;
            }
        }
        // past the cap every remaining region is dropped
        dropped += 1;
    }

    if dropped > 0 {
        tracing::warn!(dropped_regions = dropped, limit = MAX_BANKS, "too many memory banks, excess regions dropped");
    }
    banks
}

/// Identity of a region list: total bytes, region count, and each region's
/// pointer and size.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub total: usize,
    pub regions: Vec<(usize, usize)>,
}

pub fn signature(regions: &[Region]) -> Signature {
    Signature {
        total: regions.iter().map(|r| r.len).sum(),
        regions: regions.iter().map(|r| (r.data as usize, r.len)).collect(),
    }
}
