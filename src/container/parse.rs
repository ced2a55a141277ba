//! Parsers for the `|`-delimited listings printed by the container runtime CLI.
//!
//! Every parser is total: short rows are padded with empty fields and values
//! that cannot be parsed become 0.

use std::collections::HashMap;

use super::{ContainerSummary, ImageSummary, Inventory};

const FIELD_SEPARATOR: char = '|';

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;
const TIB: f64 = GIB * 1024.0;

/// Splits `line` into exactly `N` fields, padding missing ones with `""`.
///
/// Anything after the `N`-th separator is dropped.
pub fn split_fields<const N: usize>(line: &str) -> [&str; N] {
    let mut fields = [""; N];
    for (slot, part) in fields.iter_mut().zip(line.split(FIELD_SEPARATOR)) {
        *slot = part;
    }
    fields
}

/// Parses `"5.00%"`; anything unparsable is 0.
pub fn parse_percent(value: &str) -> f64 {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let number = compact.strip_suffix('%').unwrap_or(&compact);
    match number.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Parses a size such as `"512MiB"`, `"1.2kB"` or `"800B"` into bytes.
///
/// Units are case-insensitive binary multiples; an unknown unit counts as
/// bytes. Empty values and `"--"` are 0.
pub fn parse_bytes(value: &str) -> f64 {
    let value = value.trim();
    if value.is_empty() || value == "--" {
        return 0.0;
    }

    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    if split == 0 {
        return 0.0;
    }
    let Ok(number) = value[..split].parse::<f64>() else {
        return 0.0;
    };

    let multiplier = match value[split..].trim().to_ascii_lowercase().as_str() {
        "kb" | "kib" => KIB,
        "mb" | "mib" => MIB,
        "gb" | "gib" => GIB,
        "tb" | "tib" => TIB,
        _ => 1.0,
    };
    number * multiplier
}

pub fn parse_mb(value: &str) -> f64 {
    parse_bytes(value) / MIB
}

pub fn parse_kb(value: &str) -> f64 {
    parse_bytes(value) / KIB
}

/// Splits `"a / b"` into two KB values. Without a `/` the second is 0.
pub fn parse_io_pair(value: &str) -> (f64, f64) {
    match value.split_once('/') {
        Some((first, second)) => (parse_kb(first), parse_kb(second)),
        None => (parse_kb(value), 0.0),
    }
}

/// Splits `"used / limit"` into two MB values. Without a `/` the limit is 0.
pub fn parse_memory_usage(value: &str) -> (f64, f64) {
    match value.split_once('/') {
        Some((used, limit)) => (parse_mb(used), parse_mb(limit)),
        None => (parse_mb(value), 0.0),
    }
}

fn parse_count(value: &str) -> u32 {
    value.trim().parse().unwrap_or(0)
}

fn non_blank(output: &str) -> impl Iterator<Item = &str> {
    output.lines().filter(|line| !line.trim().is_empty())
}

/// One row of the identity listing: `id|name|image|status`.
pub fn parse_container_row(line: &str) -> ContainerSummary {
    let [id, name, image, status] = split_fields::<4>(line.trim_end_matches(['\r', '\n']));
    ContainerSummary {
        id: id.to_string(),
        name: (if name.is_empty() { id } else { name }).to_string(),
        image: image.to_string(),
        status: status.to_string(),
        ..Default::default()
    }
}

/// Applies one row of the stats listing
/// (`id|name|cpu%|used / limit|mem%|net rx / tx|block r / w|pids`) to `summary`.
pub fn apply_stats_row(summary: &mut ContainerSummary, line: &str) {
    let [_, name, cpu, memory, memory_percent, net, block, pids] =
        split_fields::<8>(line.trim_end_matches(['\r', '\n']));

    if !name.is_empty() {
        summary.name = name.to_string();
    } else if summary.name.is_empty() {
        summary.name = summary.id.clone();
    }
    summary.cpu = parse_percent(cpu).clamp(0.0, 100.0);
    (summary.memory_mb, summary.memory_limit_mb) = parse_memory_usage(memory);
    summary.memory_percent = parse_percent(memory_percent).clamp(0.0, 100.0);
    (summary.net_rx_kb, summary.net_tx_kb) = parse_io_pair(net);
    (summary.block_read_kb, summary.block_write_kb) = parse_io_pair(block);
    summary.pids = parse_count(pids);
}

/// One row of the image listing: `repository|tag|id|size`.
pub fn parse_image_row(line: &str) -> ImageSummary {
    let [repository, tag, id, size] = split_fields::<4>(line.trim_end_matches(['\r', '\n']));
    ImageSummary {
        repository: repository.to_string(),
        tag: tag.to_string(),
        id: id.to_string(),
        size: size.to_string(),
    }
}

/// Merges the three listings; `None` marks a listing whose command failed.
///
/// Containers are keyed by id, so the stats listing may introduce containers
/// the identity listing did not show. The result is sorted by name, then id.
pub fn merge_inventory(
    containers: Option<&str>,
    stats: Option<&str>,
    images: Option<&str>,
) -> Inventory {
    let mut by_id: HashMap<String, ContainerSummary> = HashMap::new();

    for line in containers.into_iter().flat_map(non_blank) {
        let summary = parse_container_row(line);
        by_id.insert(summary.id.clone(), summary);
    }

    for line in stats.into_iter().flat_map(non_blank) {
        let [id] = split_fields::<1>(line);
        let summary = by_id
            .entry(id.to_string())
            .or_insert_with(|| ContainerSummary {
                id: id.to_string(),
                ..Default::default()
            });
        apply_stats_row(summary, line);
    }

    let mut merged: Vec<ContainerSummary> = by_id.into_values().collect();
    merged.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    Inventory {
        available: containers.is_some() || stats.is_some() || images.is_some(),
        containers: merged,
        images: images
            .into_iter()
            .flat_map(non_blank)
            .map(parse_image_row)
            .collect(),
    }
}
