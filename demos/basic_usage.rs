//! Example usage of a daily-partitioned time series table.
//!
//! This example appends ticks spanning a day boundary, reads back a range,
//! and reopens the table from disk.

use chrono::{TimeZone, Utc};
use redb_tstable::{
    Field, FieldType, NodePath, RedbStore, Schema, TableConfig, TableStore, TimeSeriesExt, Value,
    ValueRows,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = RedbStore::create("example.redb")?;

    // Every schema starts with `timestamp: Int64`
    let schema = Schema::with_timestamp(vec![
        Field::new("bid", FieldType::Float64),
        Field::new("ask", FieldType::Float64),
    ])?;

    let root = NodePath::root();
    let mut ts = match store.get_child(&root, "EURUSD")? {
        Some(_) => store.open_ts(&root.join("EURUSD")?)?,
        None => store.create_ts(&root, "EURUSD", schema, TableConfig::default(), false)?,
    };

    // Three ticks before midnight UTC and two after
    let start = Utc.with_ymd_and_hms(2014, 5, 4, 23, 59, 59).unwrap();
    let base = start.timestamp_millis() + 997;
    if ts.max_timestamp()?.map_or(true, |max| max <= base) {
        let rows = (0..5)
            .map(|i| {
                let bid = 1.3920 + i as f64 * 0.0001;
                vec![Value::Int64(base + i), Value::Float64(bid), Value::Float64(bid + 0.0002)]
            })
            .collect();
        ts.append(ValueRows(rows))?;
        println!("Appended 5 ticks");
    }

    for (partition, table) in ts.partitions().iter() {
        println!(
            "Partition {} at {}: {} rows",
            partition,
            table,
            ts.partition_row_count(partition)?
        );
    }

    // Read back across the boundary
    let frame = ts.read_range_frame(start, base + 4)?;
    for (at, values) in frame.iter() {
        println!("{} {:?}", at.format("%Y-%m-%dT%H:%M:%S%.3fZ"), values);
    }

    println!(
        "Stored range: {:?} .. {:?}",
        ts.min_timestamp()?,
        ts.max_timestamp()?
    );

    // Reopen from the store
    let reopened = store.open_ts(ts.root())?;
    println!("Reopened table with {} rows", reopened.row_count()?);

    Ok(())
}
