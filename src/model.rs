//! Dataset value types: the caller-facing structured dataset, the on-wire JSON triple stored
//! under `ds/<uuid>`, and the materialized view handed back from a read.

use crate::catalog::{MetadataType, Product};
use crate::Error;
use std::sync::Arc;
use uuid::Uuid;

// -------------------------------------------------------------------------------------------------
//
/// The on-wire shape of a stored dataset: `{"product": str, "uris": [str], "metadata": object}`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RawDatasetDoc {
    pub product: String,
    pub uris: Vec<String>,
    pub metadata: serde_json::Value,
}

impl RawDatasetDoc {
    /// Extracts the dataset's identity from `metadata.id`, the raw-document write path's key: the
    /// storage key is extracted from `metadata.id` and parsed into 16 UUID bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDatasetId`] if `metadata.id` is absent or not a valid UUID string.
    pub fn id(&self) -> Result<Uuid, Error> {
        let raw = self
            .metadata
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or(Error::MissingDatasetId)?;
        Uuid::parse_str(raw).map_err(|_| Error::MissingDatasetId)
    }
}

// -------------------------------------------------------------------------------------------------
//
/// A structured dataset to be stored, carrying enough of its product (and, transitively, metadata
/// type) to auto-register both in the catalog the first time this product name is seen.
#[derive(Clone, Debug)]
pub struct NewDataset {
    pub id: Uuid,
    pub product: Product,
    pub metadata_type: MetadataType,
    pub uris: Vec<String>,
    pub metadata: serde_json::Value,
}

impl NewDataset {
    /// Renders this dataset into the on-wire JSON triple, ready for compression.
    #[must_use]
    pub(crate) fn to_raw(&self) -> RawDatasetDoc {
        RawDatasetDoc {
            product: self.product.name.clone(),
            uris: self.uris.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
/// A dataset read back from the cache, bound to its product definition as resolved from the
/// in-memory catalog at materialization time.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub id: Uuid,
    pub product: Arc<Product>,
    pub uris: Vec<String>,
    pub metadata: serde_json::Value,
}

impl Dataset {
    /// Resolves a decoded `(uuid, raw triple)` pair into a materialized [`Dataset`] by looking up
    /// the product by name in `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProduct`] if `raw.product` does not resolve in `catalog`.
    pub(crate) fn materialize(id: Uuid, raw: RawDatasetDoc, catalog: &crate::catalog::Catalog) -> Result<Self, Error> {
        let product = catalog
            .product(&raw.product)
            .ok_or_else(|| Error::UnknownProduct(raw.product.clone()))?;
        Ok(Self { id, product, uris: raw.uris, metadata: raw.metadata })
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::RawDatasetDoc;
    use serde_json::json;

    #[test]
    fn id_extracts_uuid_from_metadata() {
        let doc = RawDatasetDoc {
            product: "p".into(),
            uris: vec!["s3://a".into()],
            metadata: json!({"id": "00000000-0000-0000-0000-000000000001"}),
        };
        assert_eq!(doc.id().unwrap().to_string(), "00000000-0000-0000-0000-000000000001");
    }

    #[test]
    fn id_rejects_missing_metadata_id() {
        let doc = RawDatasetDoc { product: "p".into(), uris: vec![], metadata: json!({}) };
        assert!(matches!(doc.id(), Err(crate::Error::MissingDatasetId)));
    }

    #[test]
    fn id_rejects_non_uuid_metadata_id() {
        let doc = RawDatasetDoc { product: "p".into(), uris: vec![], metadata: json!({"id": "not-a-uuid"}) };
        assert!(matches!(doc.id(), Err(crate::Error::MissingDatasetId)));
    }

    #[test]
    fn raw_doc_round_trips_through_json() {
        let doc = RawDatasetDoc {
            product: "p".into(),
            uris: vec!["s3://a".into(), "s3://b".into()],
            metadata: json!({"id": "00000000-0000-0000-0000-000000000002", "extra": 7}),
        };
        let bytes = serde_json::to_vec(&doc).unwrap();
        let back: RawDatasetDoc = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc, back);
    }
}
