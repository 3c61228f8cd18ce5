//! Versioned on-disk metadata-type and product catalog, co-located with the dataset data.
//!
//! The catalog is read once into memory on open (by prefix-scanning `metadata/` and `product/` in
//! the `info` sub-database) and persisted back, under a single write transaction, on [`sync`] and
//! on close. It is modeled as a plain value owned by the cache handle: a writable handle wraps it
//! in a [`std::sync::Mutex`] for interior mutability, and a read-only handle holds an immutable
//! snapshot with no mutation path.
//!
//! [`sync`]: Catalog::persist

use crate::compression::{Compressor, Decompressor};
use crate::engine::{Database, INFO};
use crate::Error;
use std::collections::HashMap;
use std::sync::Arc;

const METADATA_PREFIX: &[u8] = b"metadata/";
const PRODUCT_PREFIX: &[u8] = b"product/";

// -------------------------------------------------------------------------------------------------
//
/// A named definition describing the shape of a product's metadata fields.
#[derive(Clone, Debug, PartialEq)]
pub struct MetadataType {
    pub name: String,
    pub definition: serde_json::Value,
}

/// A named schema/definition that datasets reference; in turn references a [`MetadataType`] by
/// name.
#[derive(Clone, Debug, PartialEq)]
pub struct Product {
    pub name: String,
    pub metadata_type: String,
    pub definition: serde_json::Value,
}

// -------------------------------------------------------------------------------------------------
//
/// The in-memory metadata-type and product catalog for one dataset cache handle.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    metadata_types: HashMap<String, Arc<MetadataType>>,
    products: HashMap<String, Arc<Product>>,
    dirty: bool,
}

impl Catalog {
    /// An empty catalog, as used when creating a brand new database.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the catalog from the `info` sub-database's `metadata/` and `product/` prefix ranges.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored definition is not valid JSON, or if a product references a
    /// metadata type that isn't also present in the catalog.
    pub(crate) fn load(database: &Database, decompressor: &Decompressor) -> Result<Self, Error> {
        let txn = database.read()?;
        let table = txn.open_table(INFO)?;

        let mut metadata_types = HashMap::new();
        for (key, value) in crate::engine::prefix_scan(&table, METADATA_PREFIX)? {
            let name = String::from_utf8_lossy(&key[METADATA_PREFIX.len()..]).into_owned();
            let definition: serde_json::Value = serde_json::from_slice(&decompressor.decompress(&value)?)?;
            metadata_types.insert(name.clone(), Arc::new(MetadataType { name, definition }));
        }

        let mut products = HashMap::new();
        for (key, value) in crate::engine::prefix_scan(&table, PRODUCT_PREFIX)? {
            let name = String::from_utf8_lossy(&key[PRODUCT_PREFIX.len()..]).into_owned();
            let definition: serde_json::Value = serde_json::from_slice(&decompressor.decompress(&value)?)?;
            let metadata_type = definition
                .get("metadata_type")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Error::MissingMetadataTypeLink { product: name.clone() })?
                .to_string();
            products.insert(name.clone(), Arc::new(Product { name, metadata_type, definition }));
        }

        let catalog = Self { metadata_types, products, dirty: false };
        catalog.validate_links()?;
        Ok(catalog)
    }

    /// Builds a catalog from caller-supplied definitions, overriding whatever is on disk for the
    /// lifetime of the handle. This is the escape hatch for downstream consumers reinterpreting
    /// records against their own schema registry.
    ///
    /// # Errors
    ///
    /// Returns an error if any product references a metadata type not present in `metadata_types`.
    pub fn external(
        metadata_types: impl IntoIterator<Item = MetadataType>,
        products: impl IntoIterator<Item = Product>,
    ) -> Result<Self, Error> {
        let metadata_types =
            metadata_types.into_iter().map(|m| (m.name.clone(), Arc::new(m))).collect();
        let products = products.into_iter().map(|p| (p.name.clone(), Arc::new(p))).collect();
        let catalog = Self { metadata_types, products, dirty: false };
        catalog.validate_links()?;
        Ok(catalog)
    }

    fn validate_links(&self) -> Result<(), Error> {
        for product in self.products.values() {
            if !self.metadata_types.contains_key(&product.metadata_type) {
                return Err(Error::UnknownMetadataType {
                    product: product.name.clone(),
                    metadata_type: product.metadata_type.clone(),
                });
            }
        }
        Ok(())
    }

    /// Looks up a product definition by name.
    #[must_use]
    pub fn product(&self, name: &str) -> Option<Arc<Product>> {
        self.products.get(name).cloned()
    }

    /// Registers a product (and its metadata type) if `product.name` is new to this catalog,
    /// marking the catalog dirty so the next [`Catalog::persist`] writes it out.
    ///
    /// Mirrors the original cache's write path: whenever a dataset is stored whose product is new
    /// to the in-memory catalog, the product (and its linked metadata type) is captured from the
    /// dataset and queued for persistence.
    pub(crate) fn register_product(&mut self, product: Product, metadata_type: MetadataType) {
        if !self.products.contains_key(&product.name) {
            self.metadata_types.entry(metadata_type.name.clone()).or_insert_with(|| Arc::new(metadata_type));
            self.products.insert(product.name.clone(), Arc::new(product));
            self.dirty = true;
        }
    }

    /// Persists every metadata-type and product definition under a single write transaction, if
    /// the catalog has changed since the last persist.
    ///
    /// By default, existing `metadata/<name>` and `product/<name>` keys are never overwritten
    /// (matching the original's `overwrite=False, dupdata=False` default); pass `overwrite = true`
    /// to replace them.
    ///
    /// # Errors
    ///
    /// Returns an error if compression, encoding, or the underlying write transaction fails.
    pub(crate) fn persist(
        &mut self,
        database: &Database,
        compressor: &Compressor,
        overwrite: bool,
    ) -> Result<(), Error> {
        if !self.dirty {
            return Ok(());
        }

        let txn = database.write()?;
        {
            let mut table = txn.open_table(INFO)?;
            for metadata_type in self.metadata_types.values() {
                let key = [METADATA_PREFIX, metadata_type.name.as_bytes()].concat();
                put_if_allowed(&mut table, &key, &metadata_type.definition, compressor, overwrite)?;
            }
            for product in self.products.values() {
                let key = [PRODUCT_PREFIX, product.name.as_bytes()].concat();
                put_if_allowed(&mut table, &key, &product.definition, compressor, overwrite)?;
            }
        }
        txn.commit()?;
        self.dirty = false;
        Ok(())
    }
}

fn put_if_allowed(
    table: &mut redb::Table<&[u8], &[u8]>,
    key: &[u8],
    definition: &serde_json::Value,
    compressor: &Compressor,
    overwrite: bool,
) -> Result<(), Error> {
    if !overwrite && table.get(key)?.is_some() {
        return Ok(());
    }
    let json = serde_json::to_vec(definition)?;
    let compressed = compressor.compress(&json)?;
    table.insert(key, compressed.as_slice())?;
    Ok(())
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::{Catalog, MetadataType, Product};
    use serde_json::json;

    #[test]
    fn external_catalog_validates_links() {
        let metadata_types = vec![MetadataType { name: "eo".into(), definition: json!({}) }];
        let products = vec![Product {
            name: "p".into(),
            metadata_type: "eo".into(),
            definition: json!({"metadata_type": "eo"}),
        }];
        assert!(Catalog::external(metadata_types, products).is_ok());
    }

    #[test]
    fn external_catalog_rejects_missing_metadata_type() {
        let products = vec![Product {
            name: "p".into(),
            metadata_type: "missing".into(),
            definition: json!({"metadata_type": "missing"}),
        }];
        let result = Catalog::external(Vec::new(), products);
        assert!(matches!(result, Err(crate::Error::UnknownMetadataType { .. })));
    }

    #[test]
    fn register_product_marks_catalog_dirty_once() {
        let mut catalog = Catalog::empty();
        assert!(catalog.product("p").is_none());

        let metadata_type = MetadataType { name: "eo".into(), definition: json!({}) };
        let product =
            Product { name: "p".into(), metadata_type: "eo".into(), definition: json!({"metadata_type": "eo"}) };

        catalog.register_product(product.clone(), metadata_type.clone());
        assert!(catalog.dirty);
        assert_eq!(catalog.product("p").unwrap().name, "p");

        catalog.dirty = false;
        catalog.register_product(product, metadata_type);
        assert!(!catalog.dirty, "registering an already-known product must not re-dirty the catalog");
    }
}
