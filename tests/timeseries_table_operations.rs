//! Integration tests for partitioned time series tables on a redb store.

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use redb_tstable::partition::{partition_index, PartitionPath};
    use redb_tstable::record::ConversionError;
    use redb_tstable::store::StoreError;
    use redb_tstable::table::{
        AppendError, CLASS_ATTR, DATA_TABLE, EXPECTED_ROWS_ATTR, VERSION_ATTR,
    };
    use redb_tstable::{
        to_epoch_ms, AttrValue, Column, ColumnBatch, ColumnData, Error, Field, FieldType,
        NodeKind, NodePath, Record, RedbStore, Schema, StorageTuning, TableConfig, TableStore,
        TimeSeriesExt, TsRow, TsTable, Value, ValueRows,
    };
    use std::error::Error as StdError;
    use tempfile::NamedTempFile;

    type TestResult = Result<(), Box<dyn StdError>>;

    fn price_schema() -> Schema {
        Schema::with_timestamp(vec![Field::new("price", FieldType::Int32)]).unwrap()
    }

    fn ms(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, milli: u32) -> i64 {
        let t = NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_milli_opt(h, mi, s, milli)
            .unwrap()
            .and_utc();
        to_epoch_ms(&t).unwrap()
    }

    fn prices(rows: &[(i64, i32)]) -> Vec<Record> {
        rows.iter()
            .map(|&(ts, price)| Record::new(ts, vec![Value::Int32(price)]))
            .collect()
    }

    fn setup() -> Result<(NamedTempFile, RedbStore, TsTable), Box<dyn StdError>> {
        let temp_file = NamedTempFile::new()?;
        let store = RedbStore::create(temp_file.path())?;
        let ts = store.create_ts(
            &NodePath::root(),
            "EURUSD",
            price_schema(),
            TableConfig::default(),
            false,
        )?;
        Ok((temp_file, store, ts))
    }

    fn day_table(root: &NodePath, names: [&str; 3]) -> NodePath {
        let mut path = root.clone();
        for name in names {
            path = path.join(name).unwrap();
        }
        path.join(DATA_TABLE).unwrap()
    }

    #[test]
    fn create_makes_todays_partition() -> TestResult {
        let before = partition_index(to_epoch_ms(&Utc::now())?);
        let (_file, store, ts) = setup()?;
        let after = partition_index(to_epoch_ms(&Utc::now())?);

        let root = ts.root().clone();
        assert_eq!(store.node_kind(&root)?, Some(NodeKind::Group));
        assert_eq!(
            store.get_attr(&root, CLASS_ATTR)?,
            Some(AttrValue::from("TIMESERIES"))
        );
        assert_eq!(
            store.get_attr(&root, VERSION_ATTR)?,
            Some(AttrValue::from("0.0.1"))
        );

        // Creation may straddle midnight UTC.
        let today = if ts.partitions().contains(before) {
            before
        } else {
            after
        };
        let names = PartitionPath::from_index(today)?.names();
        let table = day_table(&root, [names[0].as_str(), names[1].as_str(), names[2].as_str()]);

        assert_eq!(store.node_kind(&table)?, Some(NodeKind::Table));
        assert_eq!(
            store.get_attr(&table, EXPECTED_ROWS_ATTR)?,
            Some(AttrValue::UInt(10_000))
        );
        assert_eq!(store.table_schema(&table)?, price_schema());
        assert_eq!(store.row_count(&table)?, 0);
        assert_eq!(ts.max_timestamp()?, None);
        assert_eq!(ts.min_timestamp()?, None);
        Ok(())
    }

    #[test]
    fn create_rejects_bad_schema() -> TestResult {
        let temp_file = NamedTempFile::new()?;
        let store = RedbStore::create(temp_file.path())?;

        // Timestamp stored as int32 instead of int64.
        let schema = Schema::with_timestamp(vec![Field::new("price", FieldType::Int32)])?;
        let mut fields = schema.fields().to_vec();
        fields[0].field_type = FieldType::Int32;
        assert!(Schema::new(fields).is_err());

        // Timestamp not in first position.
        let swapped = vec![
            Field::new("price", FieldType::Int32),
            Field::new("timestamp", FieldType::Int64),
        ];
        assert!(Schema::new(swapped).is_err());

        assert_eq!(store.get_child(&NodePath::root(), "EURUSD")?, None);
        Ok(())
    }

    #[test]
    fn create_rolls_back_on_bad_tuning() -> TestResult {
        let temp_file = NamedTempFile::new()?;
        let store = RedbStore::create(temp_file.path())?;
        let config = TableConfig {
            tuning: StorageTuning {
                chunk_rows: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };

        let result = store.create_ts(&NodePath::root(), "EURUSD", price_schema(), config, false);
        assert!(matches!(
            result,
            Err(Error::Store(StoreError::InvalidTuning(_)))
        ));
        assert_eq!(store.get_child(&NodePath::root(), "EURUSD")?, None);

        // The name is free again.
        store.create_ts(
            &NodePath::root(),
            "EURUSD",
            price_schema(),
            TableConfig::default(),
            false,
        )?;
        Ok(())
    }

    #[test]
    fn load_same_timestamp() -> TestResult {
        let (_file, store, mut ts) = setup()?;
        let t = ms(2014, 5, 5, 1, 1, 1, 100);
        let rows = prices(&[(t, 1), (t, 2), (t, 3), (t, 4), (t, 5)]);

        ts.append(rows.clone())?;

        let table = day_table(ts.root(), ["y2014", "m05", "d05"]);
        assert_eq!(store.row_count(&table)?, 5);

        let start = Utc.with_ymd_and_hms(2014, 5, 5, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2014, 5, 6, 0, 0, 0).unwrap();
        assert_eq!(ts.read_range(start, end)?.records(), rows.as_slice());

        // The smallest possible range: a single instant.
        let instant = Utc.timestamp_millis_opt(t).unwrap();
        assert_eq!(ts.read_range(instant, instant)?.records(), rows.as_slice());
        Ok(())
    }

    #[test]
    fn load_cross_partition_boundary() -> TestResult {
        let (_file, store, mut ts) = setup()?;
        let rows = prices(&[
            (ms(2014, 5, 4, 23, 59, 59, 998), 1),
            (ms(2014, 5, 4, 23, 59, 59, 999), 2),
            (ms(2014, 5, 4, 23, 59, 59, 999), 3),
            (ms(2014, 5, 5, 0, 0, 0, 0), 4),
            (ms(2014, 5, 5, 0, 0, 0, 1), 5),
        ]);

        ts.append(rows.clone())?;

        let fourth = day_table(ts.root(), ["y2014", "m05", "d04"]);
        let fifth = day_table(ts.root(), ["y2014", "m05", "d05"]);
        assert_eq!(store.row_count(&fourth)?, 3);
        assert_eq!(store.row_count(&fifth)?, 2);
        assert_eq!(ts.partition_row_count(partition_index(rows[0].timestamp))?, 3);
        assert_eq!(ts.partition_row_count(partition_index(rows[4].timestamp))?, 2);

        let wide = ts.read_range_ms(ms(2014, 5, 4, 0, 0, 0, 0), ms(2014, 5, 6, 0, 0, 0, 0))?;
        assert_eq!(wide.records(), rows.as_slice());

        let tight = ts.read_range_ms(rows[0].timestamp, rows[4].timestamp)?;
        assert_eq!(tight.records(), rows.as_slice());

        // Exclusive of the rows on either side of the boundary.
        let inner = ts.read_range_ms(rows[1].timestamp, rows[3].timestamp)?;
        assert_eq!(inner.records(), &rows[1..4]);

        assert_eq!(ts.min_timestamp()?, Some(rows[0].timestamp));
        assert_eq!(ts.max_timestamp()?, Some(rows[4].timestamp));
        assert_eq!(ts.row_count()?, 5);
        Ok(())
    }

    #[test]
    fn rejects_non_monotonic_append() -> TestResult {
        let (_file, _store, mut ts) = setup()?;
        let t = ms(2014, 5, 5, 12, 0, 0, 0);
        ts.append(prices(&[(t, 1), (t + 10, 2)]))?;

        let result = ts.append(prices(&[(t + 5, 3)]));
        assert!(matches!(
            result,
            Err(Error::Append(AppendError::NonMonotonicAppend {
                batch_start,
                stored_max
            })) if batch_start == t + 5 && stored_max == t + 10
        ));

        // Ties with the stored maximum are allowed.
        ts.append(prices(&[(t + 10, 4)]))?;
        assert_eq!(ts.row_count()?, 3);
        Ok(())
    }

    #[test]
    fn rejects_unsorted_batch_without_writing() -> TestResult {
        let (_file, _store, mut ts) = setup()?;
        let t = ms(2014, 5, 5, 12, 0, 0, 0);

        let result = ts.append(prices(&[(t, 1), (t + 86_400_000, 2), (t + 1, 3)]));
        assert!(matches!(
            result,
            Err(Error::Append(AppendError::UnsortedBatch { index: 2, .. }))
        ));
        assert_eq!(ts.row_count()?, 0);
        assert!(!ts.partitions().contains(partition_index(t)));
        Ok(())
    }

    #[test]
    fn empty_batch_is_noop() -> TestResult {
        let (_file, _store, mut ts) = setup()?;
        let partitions = ts.partitions().len();

        ts.append(Vec::<Record>::new())?;
        ts.append(ValueRows(vec![]))?;

        assert_eq!(ts.partitions().len(), partitions);
        assert_eq!(ts.row_count()?, 0);
        Ok(())
    }

    #[test]
    fn invalid_range_is_rejected() -> TestResult {
        let (_file, _store, ts) = setup()?;
        let result = ts.read_range_ms(10, 5);
        assert!(matches!(result, Err(Error::Partition(_))));
        Ok(())
    }

    #[test]
    fn missing_days_contribute_nothing() -> TestResult {
        let (_file, _store, mut ts) = setup()?;
        let rows = prices(&[
            (ms(2014, 5, 1, 10, 0, 0, 0), 1),
            (ms(2014, 5, 4, 10, 0, 0, 0), 2),
        ]);
        ts.append(rows.clone())?;

        let all = ts.read_range_ms(ms(2014, 4, 30, 0, 0, 0, 0), ms(2014, 5, 10, 0, 0, 0, 0))?;
        assert_eq!(all.records(), rows.as_slice());

        let gap = ts.read_range_ms(ms(2014, 5, 2, 0, 0, 0, 0), ms(2014, 5, 3, 23, 0, 0, 0))?;
        assert!(gap.is_empty());
        assert_eq!(ts.partition_row_count(partition_index(ms(2014, 5, 2, 0, 0, 0, 0)))?, 0);
        Ok(())
    }

    #[test]
    fn read_strategies_agree() -> TestResult {
        let temp_file = NamedTempFile::new()?;
        let store = RedbStore::create(temp_file.path())?;
        let mut ts = store.create_ts(
            &NodePath::root(),
            "EURUSD",
            price_schema(),
            TableConfig::default(),
            false,
        )?;

        let start = ms(2014, 5, 4, 0, 0, 0, 0);
        let rows: Vec<(i64, i32)> = (0..200).map(|i| (start + i * 1_200_000, i as i32)).collect();
        ts.append(prices(&rows))?;

        let scanning = store.open_ts(ts.root())?.with_scan_threshold(0.0)?;
        let searching = store.open_ts(ts.root())?.with_scan_threshold(1.0)?;

        for (from, to) in [
            (start, start + 3 * 86_400_000),
            (start + 3_600_000, start + 7_200_000),
            (start + 80_000_000, start + 90_000_000),
            (start + 1_200_000, start + 1_200_000),
        ] {
            assert_eq!(
                scanning.read_range_ms(from, to)?,
                searching.read_range_ms(from, to)?
            );
            assert_eq!(ts.read_range_ms(from, to)?, scanning.read_range_ms(from, to)?);
        }
        Ok(())
    }

    #[test]
    fn reopen_recovers_table() -> TestResult {
        let temp_file = NamedTempFile::new()?;
        let rows = prices(&[
            (ms(2014, 5, 4, 23, 0, 0, 0), 1),
            (ms(2014, 5, 5, 1, 0, 0, 0), 2),
        ]);

        {
            let store = RedbStore::create(temp_file.path())?;
            let config = TableConfig::new(250, 0.5, StorageTuning::default())?;
            let mut ts =
                store.create_ts(&NodePath::root(), "EURUSD", price_schema(), config, false)?;
            ts.append(rows.clone())?;
        }

        let store = RedbStore::create(temp_file.path())?;
        let root = NodePath::parse("/EURUSD")?;
        assert!(store.is_timeseries(&root)?);

        let mut ts = store.open_ts(&root)?;
        assert_eq!(ts.schema().as_ref(), &price_schema());
        assert_eq!(ts.config().expected_rows_per_partition, 250);
        assert_eq!(ts.max_timestamp()?, Some(rows[1].timestamp));
        assert_eq!(ts.read_range_ms(rows[0].timestamp, rows[1].timestamp)?.records(), rows.as_slice());

        // The monotonicity check survives the reopen.
        assert!(ts.append(prices(&[(rows[0].timestamp, 3)])).is_err());
        ts.append(prices(&[(rows[1].timestamp + 1, 4)]))?;
        assert_eq!(ts.row_count()?, 3);
        Ok(())
    }

    #[test]
    fn handles_share_table_extents() -> TestResult {
        let (_file, store, mut writer) = setup()?;
        let day = 86_400_000;
        let t = ms(2014, 5, 5, 12, 0, 0, 0);
        writer.append(prices(&[(t, 1)]))?;

        let mut other = store.open_ts(writer.root())?;
        writer.append(prices(&[(t + 5 * day, 2)]))?;
        let later = partition_index(t + 5 * day);

        assert_eq!(other.max_timestamp()?, Some(t + 5 * day));
        assert_eq!(other.read_range_ms(t + 5 * day, t + 5 * day)?.len(), 1);
        assert_eq!(other.row_count()?, 2);
        assert_eq!(other.partition_row_count(later)?, 1);

        let result = other.append(prices(&[(t + day, 3)]));
        assert!(matches!(
            result,
            Err(Error::Append(AppendError::NonMonotonicAppend { stored_max, .. }))
                if stored_max == t + 5 * day
        ));
        let rejected_day = day_table(writer.root(), ["y2014", "m05", "d06"]);
        assert_eq!(store.node_kind(&rejected_day)?, None);

        // The partition made by the first handle is reused, not recreated.
        assert!(!other.partitions().contains(later));
        other.append(prices(&[(t + 5 * day + 1, 4)]))?;
        assert_eq!(writer.partition_row_count(later)?, 2);

        other.refresh()?;
        writer.refresh()?;
        assert_eq!(other.partitions(), writer.partitions());
        Ok(())
    }

    struct Tick {
        at: i64,
        price: i64,
    }

    impl TsRow for Tick {
        fn timestamp(&self) -> i64 {
            self.at
        }

        fn values(&self) -> Vec<Value> {
            vec![Value::Int64(self.price)]
        }
    }

    #[test]
    fn append_accepts_every_representation() -> TestResult {
        let (_file, _store, mut ts) = setup()?;
        let t = ms(2014, 5, 5, 0, 0, 0, 0);

        // Struct rows, coerced from int64 into the int32 column.
        let ticks = vec![Tick { at: t, price: 1 }, Tick { at: t + 1, price: 2 }];
        ts.append(&ticks)?;

        // Row-major values with the timestamp first.
        ts.append(ValueRows(vec![vec![Value::Int64(t + 2), Value::Int16(3)]]))?;

        // Column-major data.
        ts.append(ColumnBatch::new(vec![
            Column::new("timestamp", ColumnData::Int64(vec![t + 3, t + 4])),
            Column::new("price", ColumnData::Int32(vec![4, 5])),
        ]))?;

        // A time-indexed frame read back from the table.
        let frame = ts.read_range_frame(t, t + 1)?;
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.index()[0], Utc.timestamp_millis_opt(t).unwrap());

        let batch = ts.read_range_ms(t, t + 10)?;
        let stored: Vec<&Value> = batch.column("price").unwrap_or_default();
        assert_eq!(
            stored,
            vec![
                &Value::Int32(1),
                &Value::Int32(2),
                &Value::Int32(3),
                &Value::Int32(4),
                &Value::Int32(5)
            ]
        );

        // Rows that cannot be coerced are rejected before anything is written.
        let bad = ts.append(ValueRows(vec![vec![
            Value::Int64(t + 20),
            Value::Utf8("x".to_string()),
        ]]));
        assert!(matches!(
            bad,
            Err(Error::Conversion(ConversionError::FieldType { .. }))
        ));
        assert_eq!(ts.row_count()?, 5);
        Ok(())
    }

    #[test]
    fn pre_epoch_rows_land_on_their_day() -> TestResult {
        let (_file, store, mut ts) = setup()?;
        let rows = prices(&[(-2, 1), (-1, 2), (0, 3)]);
        ts.append(rows.clone())?;

        let last_day = day_table(ts.root(), ["y1969", "m12", "d31"]);
        let first_day = day_table(ts.root(), ["y1970", "m01", "d01"]);
        assert_eq!(store.row_count(&last_day)?, 2);
        assert_eq!(store.row_count(&first_day)?, 1);
        assert_eq!(ts.read_range_ms(-1, 0)?.records(), &rows[1..]);
        Ok(())
    }
}
