//! Inputs accepted by the merge engine.

/// Anything that may hold the bytes of one PDF document.
///
/// `None` and empty buffers are the "null" and "empty" inputs the merge
/// skips without error.
pub trait PdfSource {
    /// The document bytes, or `None` for a null input.
    fn pdf_bytes(&self) -> Option<&[u8]>;
}

impl PdfSource for [u8] {
    fn pdf_bytes(&self) -> Option<&[u8]> {
        Some(self)
    }
}

impl<const N: usize> PdfSource for [u8; N] {
    fn pdf_bytes(&self) -> Option<&[u8]> {
        Some(self)
    }
}

impl PdfSource for Vec<u8> {
    fn pdf_bytes(&self) -> Option<&[u8]> {
        Some(self)
    }
}

impl PdfSource for Box<[u8]> {
    fn pdf_bytes(&self) -> Option<&[u8]> {
        Some(self)
    }
}

impl<T: PdfSource + ?Sized> PdfSource for &T {
    fn pdf_bytes(&self) -> Option<&[u8]> {
        (**self).pdf_bytes()
    }
}

impl<T: PdfSource> PdfSource for Option<T> {
    fn pdf_bytes(&self) -> Option<&[u8]> {
        self.as_ref().and_then(PdfSource::pdf_bytes)
    }
}

/// Non-empty inputs with their position in the original sequence.
pub(crate) fn usable_inputs<S: PdfSource>(items: &[S]) -> Vec<(usize, &[u8])> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            item.pdf_bytes()
                .filter(|bytes| !bytes.is_empty())
                .map(|bytes| (index, bytes))
        })
        .collect()
}
