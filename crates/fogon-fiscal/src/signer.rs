//! # Document Signer
//!
//! Seam for the electronic signature applied to the canonical document
//! before submission. Real signing (XAdES over the issuer's certificate)
//! is out of scope; [`PassthroughSigner`] forwards the text unchanged so
//! the pipeline exercises the seam end to end.

use crate::error::FiscalResult;

/// Signs the canonical document text prior to submission.
pub trait DocumentSigner: Send + Sync {
    fn sign(&self, document_text: &str) -> FiscalResult<String>;
}

/// No-op signer: the submitted payload is the canonical text itself.
#[derive(Debug, Clone, Default)]
pub struct PassthroughSigner;

impl DocumentSigner for PassthroughSigner {
    fn sign(&self, document_text: &str) -> FiscalResult<String> {
        Ok(document_text.to_string())
    }
}
