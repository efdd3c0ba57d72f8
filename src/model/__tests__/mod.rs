pub mod embedding_test;
pub mod vector_test;
