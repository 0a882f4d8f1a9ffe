/// Arrow schema and batch conversion for crosswalk reports.
pub mod crosswalk {
    use std::sync::Arc;

    use arrow::array::{
        ArrayRef, BooleanArray, Float32Array, ListBuilder, StringArray, StringBuilder,
        UInt32Array,
    };
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::error::ArrowError;
    use arrow::record_batch::RecordBatch;

    use crate::mapping::Mapping;

    fn string_list() -> DataType {
        DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)))
    }

    /// One row per selected mapping.
    pub fn mapping_schema() -> Schema {
        Schema::new(vec![
            Field::new("run_id", DataType::Utf8, false),
            Field::new("source_item_id", DataType::Utf8, false),
            Field::new("source_section", DataType::Utf8, true),
            Field::new("source_page", DataType::UInt32, true),
            Field::new("target_item_id", DataType::Utf8, false),
            Field::new("target_section", DataType::Utf8, true),
            Field::new("target_page", DataType::UInt32, true),
            Field::new("match_type", DataType::Utf8, false),
            Field::new("impact", DataType::Utf8, false),
            Field::new("confidence_level", DataType::Utf8, false),
            Field::new("confidence_rationale", DataType::Utf8, false),
            Field::new("abstain_reasons", string_list(), false),
            Field::new("question_aligned", DataType::Boolean, false),
            Field::new("option_mapping_count", DataType::UInt32, false),
            Field::new("violations", string_list(), false),
            Field::new("embedding_similarity", DataType::Float32, false),
            Field::new("needs_review", DataType::Boolean, false),
        ])
    }

    fn strings<'m>(mappings: &'m [Mapping], f: impl Fn(&'m Mapping) -> &'m str) -> ArrayRef {
        Arc::new(StringArray::from_iter_values(mappings.iter().map(f)))
    }

    fn optional_strings<'m>(
        mappings: &'m [Mapping],
        f: impl Fn(&'m Mapping) -> Option<&'m str>,
    ) -> ArrayRef {
        Arc::new(StringArray::from(mappings.iter().map(f).collect::<Vec<_>>()))
    }

    fn pages<'m>(mappings: &'m [Mapping], f: impl Fn(&'m Mapping) -> Option<u32>) -> ArrayRef {
        Arc::new(UInt32Array::from(mappings.iter().map(f).collect::<Vec<_>>()))
    }

    fn string_lists<'m>(
        mappings: &'m [Mapping],
        f: impl Fn(&'m Mapping) -> &'m [String],
    ) -> ArrayRef {
        let mut builder = ListBuilder::new(StringBuilder::new());
        for m in mappings {
            for value in f(m) {
                builder.values().append_value(value);
            }
            builder.append(true);
        }
        Arc::new(builder.finish())
    }

    /// Flatten mappings into a single [`RecordBatch`] matching [`mapping_schema`].
    pub fn mappings_to_batch(mappings: &[Mapping]) -> Result<RecordBatch, ArrowError> {
        let columns: Vec<ArrayRef> = vec![
            strings(mappings, |m| m.run_id.as_str()),
            strings(mappings, Mapping::source_id),
            optional_strings(mappings, |m| m.source_anchor.section_context.as_deref()),
            pages(mappings, |m| m.source_anchor.page),
            strings(mappings, Mapping::target_id),
            optional_strings(mappings, |m| m.target_anchor.section_context.as_deref()),
            pages(mappings, |m| m.target_anchor.page),
            strings(mappings, |m| m.classification.match_type.as_str()),
            strings(mappings, |m| m.classification.impact.as_str()),
            strings(mappings, |m| m.classification.confidence_level.as_str()),
            strings(mappings, |m| m.classification.confidence_rationale.as_str()),
            string_lists(mappings, |m| m.classification.abstain_reasons.as_slice()),
            Arc::new(BooleanArray::from(
                mappings
                    .iter()
                    .map(|m| m.structure_analysis.question_alignment.value)
                    .collect::<Vec<_>>(),
            )),
            Arc::new(UInt32Array::from_iter_values(
                mappings.iter().map(|m| m.option_mappings.len() as u32),
            )),
            string_lists(mappings, |m| m.consistency_checks.violations.as_slice()),
            Arc::new(Float32Array::from_iter_values(
                mappings.iter().map(|m| m.embedding_similarity),
            )),
            Arc::new(BooleanArray::from(
                mappings.iter().map(Mapping::needs_review).collect::<Vec<_>>(),
            )),
        ];

        RecordBatch::try_new(Arc::new(mapping_schema()), columns)
    }
}
