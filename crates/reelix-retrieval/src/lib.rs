pub mod bm25;
pub mod encoder;
pub mod filter;
pub mod provider_table;
pub mod retriever;
pub mod tokenizer;

pub use bm25::{Bm25Model, SparseVector};
pub use encoder::{DenseEmbedder, EncodeError, Encoder, OpenAiEmbedder};
pub use filter::RetrievalFilter;
pub use retriever::{QdrantRetriever, RetrievalError, VectorRetriever};
