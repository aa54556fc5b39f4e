//! Arrow schema of a deployed retrieval index.
//!
//! Arrow versions MUST match lancedb's transitive dependency (57.3 for lancedb 0.26).

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

/// One row per candidate: a whole document (`sentence` null) or one of its
/// sentences.
pub fn retrieval_index_schema(dimension: i32) -> Schema {
    Schema::new(vec![
        Field::new("document_id", DataType::Int64, false),
        Field::new("sentence", DataType::Int32, true),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension,
            ),
            false,
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_vector_dimension() {
        let schema = retrieval_index_schema(768);
        assert_eq!(schema.fields().len(), 3);
        match schema.field_with_name("vector").unwrap().data_type() {
            DataType::FixedSizeList(item, dim) => {
                assert_eq!(*dim, 768);
                assert_eq!(item.data_type(), &DataType::Float32);
            }
            other => panic!("unexpected vector type: {other:?}"),
        }
        assert!(schema.field_with_name("sentence").unwrap().is_nullable());
    }
}
