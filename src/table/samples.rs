//! Built-in example datasets
//!
//! Two seeded generators that give a fresh workbench something to look at:
//! a daily mining log and a per-minute golem telemetry log. Both use seed 42
//! so the same tables (and therefore the same trained metrics) come out on
//! every start.

use super::TableHandle;
use crate::Result;
use arrow::array::{
    ArrayRef, Date32Array, Float64Array, Int64Array, StringArray, TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Name of the mining example dataset
pub const MINING_DATASET: &str = "Mining 2026";

/// Name of the golem example dataset
pub const GOLEM_DATASET: &str = "Iron Golems";

const SAMPLE_SEED: u64 = 42;
const MINING_ROWS: usize = 1000;
const GOLEM_ROWS: usize = 5000;

const BLOCK_TYPES: [&str; 6] = ["DIAMOND", "IRON", "GOLD", "COAL", "STONE", "DIRT"];
const BIOMES: [&str; 5] = ["FOREST", "DESERT", "MOUNTAINS", "OCEAN", "CAVE"];
const MINERS: [&str; 4] = ["Steve", "Alex", "Herobrine", "Villager"];
const TOOLS: [&str; 4] = ["DIAMOND_PICK", "IRON_PICK", "STONE_PICK", "WOOD_PICK"];
const GOLEM_STATUS: [(&str, f64); 4] = [
    ("ACTIVE", 0.7),
    ("IDLE", 0.2),
    ("DAMAGED", 0.08),
    ("DESTROYED", 0.02),
];

/// Both example datasets, mining log first.
///
/// # Errors
///
/// Returns error if a batch cannot be assembled
pub fn example_tables() -> Result<Vec<TableHandle>> {
    Ok(vec![mining_table()?, golem_table()?])
}

/// Price multiplier applied to `quantity` to get `value`.
#[must_use]
pub fn block_value_multiplier(block_type: &str) -> i64 {
    match block_type {
        "DIAMOND" => 100,
        "GOLD" => 50,
        "IRON" => 25,
        _ => 1,
    }
}

fn pick<'a>(rng: &mut StdRng, choices: &[&'a str]) -> &'a str {
    choices.choose(rng).copied().unwrap_or_default()
}

/// Daily mining log starting 2026-01-01.
///
/// A few `depth`/`quantity` cells are left null so the loader, profile and
/// pipeline paths see missing data.
///
/// # Errors
///
/// Returns error if the batch cannot be assembled
pub fn mining_table() -> Result<TableHandle> {
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default();
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let first_day = i32::try_from((start - epoch).num_days()).unwrap_or_default();

    let mut dates = Vec::with_capacity(MINING_ROWS);
    let mut block_types = Vec::with_capacity(MINING_ROWS);
    let mut depths = Vec::with_capacity(MINING_ROWS);
    let mut quantities = Vec::with_capacity(MINING_ROWS);
    let mut biomes = Vec::with_capacity(MINING_ROWS);
    let mut miners = Vec::with_capacity(MINING_ROWS);
    let mut tools = Vec::with_capacity(MINING_ROWS);
    let mut values = Vec::with_capacity(MINING_ROWS);

    for day in 0..MINING_ROWS {
        let block = pick(&mut rng, &BLOCK_TYPES);
        let depth: i64 = rng.gen_range(1..64);
        let quantity: i64 = rng.gen_range(1..64);
        dates.push(first_day + i32::try_from(day).unwrap_or_default());
        block_types.push(block);
        depths.push(Some(depth));
        quantities.push(Some(quantity));
        biomes.push(pick(&mut rng, &BIOMES));
        miners.push(pick(&mut rng, &MINERS));
        tools.push(pick(&mut rng, &TOOLS));
        values.push(quantity * block_value_multiplier(block));
    }

    // 2% holes in each numeric feature column
    let holes = MINING_ROWS / 50;
    for column in [&mut depths, &mut quantities] {
        for idx in rand::seq::index::sample(&mut rng, MINING_ROWS, holes).into_vec() {
            column[idx] = None;
        }
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("block_type", DataType::Utf8, false),
        Field::new("depth", DataType::Int64, true),
        Field::new("quantity", DataType::Int64, true),
        Field::new("biome", DataType::Utf8, false),
        Field::new("miner", DataType::Utf8, false),
        Field::new("tool_used", DataType::Utf8, false),
        Field::new("value", DataType::Int64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Date32Array::from(dates)),
        Arc::new(StringArray::from(block_types)),
        Arc::new(Int64Array::from(depths)),
        Arc::new(Int64Array::from(quantities)),
        Arc::new(StringArray::from(biomes)),
        Arc::new(StringArray::from(miners)),
        Arc::new(StringArray::from(tools)),
        Arc::new(Int64Array::from(values)),
    ];
    Ok(TableHandle::new(
        MINING_DATASET,
        RecordBatch::try_new(schema, columns)?,
    ))
}

/// Per-minute golem telemetry starting 2026-01-01T00:00Z.
///
/// # Errors
///
/// Returns error if the batch cannot be assembled
pub fn golem_table() -> Result<TableHandle> {
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let start_ms = Utc
        .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .map_or(0, |t| t.timestamp_millis());

    let mut timestamps = Vec::with_capacity(GOLEM_ROWS);
    let mut golem_ids = Vec::with_capacity(GOLEM_ROWS);
    let mut iron_blocks = Vec::with_capacity(GOLEM_ROWS);
    let mut health = Vec::with_capacity(GOLEM_ROWS);
    let mut protected = Vec::with_capacity(GOLEM_ROWS);
    let mut damage = Vec::with_capacity(GOLEM_ROWS);
    let mut status = Vec::with_capacity(GOLEM_ROWS);

    for minute in 0..GOLEM_ROWS {
        timestamps.push(start_ms + i64::try_from(minute).unwrap_or_default() * 60_000);
        golem_ids.push(rng.gen_range(1_i64..21));
        iron_blocks.push(rng.gen_range(0_i64..4));
        health.push(round1(rng.gen_range(0.0..20.0)));
        protected.push(rng.gen_range(0_i64..10));
        // Exponential(1) by inversion
        let u: f64 = rng.gen();
        damage.push(round1(-(1.0 - u).ln()));
        status.push(weighted_status(rng.gen()));
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            false,
        ),
        Field::new("golem_id", DataType::Int64, false),
        Field::new("iron_blocks", DataType::Int64, false),
        Field::new("health", DataType::Float64, false),
        Field::new("villagers_protected", DataType::Int64, false),
        Field::new("damage_taken", DataType::Float64, false),
        Field::new("status", DataType::Utf8, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampMillisecondArray::from(timestamps)),
        Arc::new(Int64Array::from(golem_ids)),
        Arc::new(Int64Array::from(iron_blocks)),
        Arc::new(Float64Array::from(health)),
        Arc::new(Int64Array::from(protected)),
        Arc::new(Float64Array::from(damage)),
        Arc::new(StringArray::from(status)),
    ];
    Ok(TableHandle::new(
        GOLEM_DATASET,
        RecordBatch::try_new(schema, columns)?,
    ))
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn weighted_status(u: f64) -> &'static str {
    let mut acc = 0.0;
    for (label, weight) in GOLEM_STATUS {
        acc += weight;
        if u < acc {
            return label;
        }
    }
    GOLEM_STATUS[GOLEM_STATUS.len() - 1].0
}
