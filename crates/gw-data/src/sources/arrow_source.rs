//! Arrow IPC stream reader

use std::io::Cursor;

use arrow::compute::cast;
use arrow::compute::kernels::concat::concat_batches;
use arrow::ipc::reader::StreamReader;
use arrow::record_batch::RecordBatch;

use super::RawColumns;
use crate::cell::ColumnType;
use crate::table::columnar::read_cell;
use crate::DataError;

/// Read an Arrow IPC stream; column types follow the stream's schema
pub fn read_arrow(bytes: &[u8]) -> Result<RawColumns, DataError> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    let schema = reader.schema();
    let batches = reader.collect::<Result<Vec<RecordBatch>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    let mut raw = RawColumns::new();
    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        let column_type = ColumnType::from_data_type(field.data_type()).ok_or_else(|| {
            DataError::UnsupportedFormat(format!(
                "Arrow column `{}` has unsupported type {}",
                field.name(),
                field.data_type()
            ))
        })?;
        let array = cast(array, &column_type.data_type())?;
        let values = (0..array.len())
            .map(|row| serde_json::to_value(read_cell(&array, column_type, row)))
            .collect::<Result<Vec<_>, _>>()?;
        raw.types.insert(field.name().clone(), column_type);
        raw.push_column(field.name().clone(), values);
    }
    raw.len = batch.num_rows();
    raw.pad();
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Float32Array, Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::ipc::writer::StreamWriter;
    use serde_json::json;

    fn ipc_bytes() -> Vec<u8> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("score", DataType::Float32, true),
            Field::new("name", DataType::Utf8, true),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int32Array::from(vec![1, 2])),
            Arc::new(Float32Array::from(vec![Some(0.5), None])),
            Arc::new(StringArray::from(vec!["a", "b"])),
        ];
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();

        let mut bytes = Vec::new();
        {
            let mut writer = StreamWriter::try_new(&mut bytes, &schema).unwrap();
            writer.write(&batch).unwrap();
            writer.finish().unwrap();
        }
        bytes
    }

    #[test]
    fn test_read_arrow_widens_types() {
        let raw = read_arrow(&ipc_bytes()).unwrap();

        assert_eq!(raw.names, vec!["id", "score", "name"]);
        assert_eq!(raw.len, 2);
        assert_eq!(raw.types["id"], ColumnType::Integer);
        assert_eq!(raw.types["score"], ColumnType::Float);
        assert_eq!(raw.values[0], vec![json!(1), json!(2)]);
        assert_eq!(raw.values[1], vec![json!(0.5), serde_json::Value::Null]);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(read_arrow(b"not arrow").is_err());
    }
}
