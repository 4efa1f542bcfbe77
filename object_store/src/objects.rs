use kaldb_types::ChunkMetadata;

use crate::{
    raw::{BlobIoError, BoxedError},
    ObjectStore,
};

/// Object that can be stored in an [`ObjectStore`].
pub trait StoredObject: Sized {
    /// Logical unique key for the object. The lifetime param allows defining keys
    /// that borrow data.
    type Key<'a>: Copy;

    /// Encodes the object key to a string.
    fn encode_key(key: Self::Key<'_>) -> String;

    /// Serializes a value to a blob.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn serialize(&self) -> Result<Vec<u8>, BoxedError>;

    /// Deserializes a value from the blob.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    fn deserialize(bytes: Vec<u8>) -> Result<Self, BoxedError>;
}

/// Derives [`StoredObject::serialize()`] and [`StoredObject::deserialize()`] using
/// the `bincode` (de)serializer. Should be used in `impl StoredObject` blocks.
#[macro_export]
macro_rules! serialize_using_bincode {
    () => {
        fn serialize(
            &self,
        ) -> std::result::Result<std::vec::Vec<u8>, $crate::_reexports::BoxedError> {
            $crate::bincode::serialize(self).map_err(std::convert::From::from)
        }

        fn deserialize(
            bytes: std::vec::Vec<u8>,
        ) -> std::result::Result<Self, $crate::_reexports::BoxedError> {
            $crate::bincode::deserialize(&bytes).map_err(std::convert::From::from)
        }
    };
}

impl dyn ObjectStore + '_ {
    /// Fetches and decodes the value stored under the given key.
    pub async fn get<V: StoredObject>(&self, key: V::Key<'_>) -> Result<V, BlobIoError> {
        let key = V::encode_key(key);
        let bytes = self.get_raw(&key).await?;
        V::deserialize(bytes).map_err(|err| BlobIoError::new("decode", key, err))
    }

    /// Encodes and stores the value under the given key, replacing an
    /// existing blob. Returns the encoded key.
    pub async fn put<V: StoredObject>(
        &self,
        key: V::Key<'_>,
        value: &V,
    ) -> Result<String, BlobIoError> {
        let key = V::encode_key(key);
        let bytes = value
            .serialize()
            .map_err(|err| BlobIoError::new("encode", key.clone(), err))?;
        self.put_raw(&key, bytes).await?;
        Ok(key)
    }
}

impl StoredObject for ChunkMetadata {
    type Key<'a> = &'a str;

    fn encode_key(key: Self::Key<'_>) -> String {
        format!("{key}/{key}.metadata")
    }

    serialize_using_bincode!();
}
