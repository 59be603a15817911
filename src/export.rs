use std::fs;
use std::path::Path;
use std::sync::Arc;

use parquet::data_type::{ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use tracing::{info, warn};

use crate::differentials::{TrainingMatrix, TrainingRow};
use crate::error::{FeatureError, Result};

enum ColumnData {
    Text(Vec<ByteArray>),
    OptionalText(Vec<ByteArray>, Vec<i16>),
    Long(Vec<i64>),
    OptionalDouble(Vec<f64>, Vec<i16>),
}

fn optional_doubles(values: impl Iterator<Item = Option<f64>>) -> ColumnData {
    let mut present = Vec::new();
    let mut defs = Vec::new();
    for v in values {
        match v {
            Some(v) => {
                present.push(v);
                defs.push(1);
            }
            None => defs.push(0),
        }
    }
    ColumnData::OptionalDouble(present, defs)
}

fn schema_for(matrix: &TrainingMatrix) -> Result<String> {
    let mut message = String::from(
        "message training_matrix {\n\
         REQUIRED BYTE_ARRAY event_id (UTF8);\n\
         REQUIRED BYTE_ARRAY entity_a_id (UTF8);\n\
         REQUIRED BYTE_ARRAY entity_b_id (UTF8);\n\
         REQUIRED BYTE_ARRAY event_date (UTF8);\n\
         OPTIONAL BYTE_ARRAY category (UTF8);\n\
         REQUIRED INT64 label;\n",
    );
    for name in &matrix.feature_names {
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FeatureError::validation(
                "matrix",
                format!("column name {name:?} is not a plain identifier"),
            ));
        }
        message.push_str(&format!("OPTIONAL DOUBLE {name};\n"));
    }
    message.push('}');
    Ok(message)
}

fn columns_for(matrix: &TrainingMatrix) -> Vec<ColumnData> {
    let text = |pick: fn(&TrainingRow) -> String| {
        ColumnData::Text(
            matrix
                .rows
                .iter()
                .map(|r| ByteArray::from(pick(r).as_str()))
                .collect(),
        )
    };
    let mut columns = vec![
        text(|r| r.event_id.0.clone()),
        text(|r| r.entity_a_id.0.clone()),
        text(|r| r.entity_b_id.0.clone()),
        text(|r| r.event_date.format("%Y-%m-%d").to_string()),
    ];

    let mut categories = Vec::new();
    let mut category_defs = Vec::new();
    for row in &matrix.rows {
        match &row.category {
            Some(c) => {
                categories.push(ByteArray::from(c.as_str()));
                category_defs.push(1);
            }
            None => category_defs.push(0),
        }
    }
    columns.push(ColumnData::OptionalText(categories, category_defs));
    columns.push(ColumnData::Long(
        matrix.rows.iter().map(|r| i64::from(r.label)).collect(),
    ));
    for idx in 0..matrix.feature_names.len() {
        columns.push(optional_doubles(matrix.rows.iter().map(|r| r.features[idx])));
    }
    columns
}

fn check_row_widths(matrix: &TrainingMatrix) -> Result<()> {
    let width = matrix.feature_names.len();
    match matrix.rows.iter().find(|r| r.features.len() != width) {
        Some(row) => Err(FeatureError::validation(
            "matrix",
            format!(
                "row for event {} has {} values for {width} columns",
                row.event_id,
                row.features.len()
            ),
        )),
        None => Ok(()),
    }
}

fn write_parquet(matrix: &TrainingMatrix, schema: String, tmp: &Path) -> Result<()> {
    let schema = Arc::new(parse_message_type(&schema)?);
    let props = Arc::new(WriterProperties::builder().build());
    let file = fs::File::create(tmp)?;
    let mut writer = SerializedFileWriter::new(file, schema, props)?;

    let mut row_group = writer.next_row_group()?;
    let mut columns = columns_for(matrix).into_iter();
    while let Some(mut col) = row_group.next_column()? {
        let Some(data) = columns.next() else {
            return Err(FeatureError::validation("matrix", "schema has more columns than data"));
        };
        match data {
            ColumnData::Text(values) => {
                col.typed::<ByteArrayType>().write_batch(&values, None, None)?;
            }
            ColumnData::OptionalText(values, defs) => {
                col.typed::<ByteArrayType>()
                    .write_batch(&values, Some(&defs), None)?;
            }
            ColumnData::Long(values) => {
                col.typed::<Int64Type>().write_batch(&values, None, None)?;
            }
            ColumnData::OptionalDouble(values, defs) => {
                col.typed::<DoubleType>()
                    .write_batch(&values, Some(&defs), None)?;
            }
        }
        col.close()?;
    }
    row_group.close()?;
    writer.close()?;
    Ok(())
}

/// Writes the matrix as a single-row-group Parquet file, via `<path>.tmp`.
///
/// On any failure the temporary file is removed and `path` is left untouched.
pub fn write_training_matrix(matrix: &TrainingMatrix, path: &Path) -> Result<()> {
    let schema = schema_for(matrix)?;
    check_row_widths(matrix)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("parquet.tmp");
    let written = write_parquet(matrix, schema, &tmp)
        .and_then(|()| fs::rename(&tmp, path).map_err(FeatureError::from));
    if let Err(err) = written {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            warn!(path = %tmp.display(), error = %cleanup, "could not remove partial export");
        }
        return Err(err);
    }

    info!(
        rows = matrix.len(),
        columns = matrix.feature_names.len() + 6,
        path = %path.display(),
        "training matrix written"
    );
    Ok(())
}
