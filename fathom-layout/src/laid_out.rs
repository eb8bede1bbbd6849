use crate::layout::TensorLayout;
use fathom_base::{ChunkSize, TensorIndex};

/// One chunk of a laid-out tensor: the layout, which chunk (by base
/// index), and the payload occupying it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LaidOutChunk<T> {
    layout: TensorLayout,
    offset: TensorIndex,
    payload: T,
}

impl<T> LaidOutChunk<T> {
    pub fn new(layout: TensorLayout, offset: TensorIndex, payload: T) -> Self {
        assert!(*offset.shape() == *layout.shape());
        assert!(layout.chunk_offsets().contains(&offset));
        LaidOutChunk {
            layout,
            offset,
            payload,
        }
    }

    pub fn layout(&self) -> &TensorLayout {
        &self.layout
    }

    pub fn offset(&self) -> &TensorIndex {
        &self.offset
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut T {
        &mut self.payload
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

/// A layout plus exactly one payload chunk per chunk offset, held in
/// ascending offset order.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LaidOutTensor<T> {
    layout: TensorLayout,
    chunks: Vec<LaidOutChunk<T>>,
}

impl<T> LaidOutTensor<T> {
    pub fn new(mut chunks: Vec<LaidOutChunk<T>>) -> Self {
        assert!(!chunks.is_empty());
        let layout = chunks[0].layout().clone();
        assert!(chunks.len() == layout.total_chunks());
        for chunk in &chunks {
            assert!(*chunk.layout() == layout);
        }
        chunks.sort_by_key(|chunk| chunk.offset().flat());
        for (chunk, offset) in chunks.iter().zip(layout.chunk_offsets()) {
            assert!(chunk.offset() == offset);
        }
        LaidOutTensor { layout, chunks }
    }

    pub fn layout(&self) -> &TensorLayout {
        &self.layout
    }

    pub fn chunks(&self) -> &[LaidOutChunk<T>] {
        &self.chunks
    }

    pub fn chunks_mut(&mut self) -> &mut [LaidOutChunk<T>] {
        &mut self.chunks
    }

    pub fn into_chunks(self) -> Vec<LaidOutChunk<T>> {
        self.chunks
    }

    pub fn offsets(&self) -> &[TensorIndex] {
        self.layout.chunk_offsets()
    }

    pub fn at_offset(&self, offset: &TensorIndex) -> &LaidOutChunk<T> {
        self.chunks
            .iter()
            .find(|chunk| chunk.offset() == offset)
            .expect("no chunk at requested offset")
    }
}

/// A tensor index viewed through a layout: which chunk, which slot.
#[derive(Clone, Debug)]
pub struct LaidOutTensorIndex {
    layout: TensorLayout,
    ti: TensorIndex,
}

impl LaidOutTensorIndex {
    pub fn new(layout: TensorLayout, ti: TensorIndex) -> Self {
        LaidOutTensorIndex { layout, ti }
    }

    pub fn chunk_number(&self) -> usize {
        self.layout.chunk_number_at(&self.ti)
    }

    pub fn chunk_index(&self) -> i64 {
        self.layout.chunk_index_at(&self.ti)
    }

    pub fn chunk_size(&self) -> ChunkSize {
        self.layout.chunk_size()
    }

    pub fn total_chunks(&self) -> usize {
        self.layout.total_chunks()
    }
}

/// A slot-level displacement between two laid-out positions, reduced
/// modulo the chunk count and the chunk size.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct LaidOutTranslation {
    num_chunks: usize,
    chunk_size: ChunkSize,
    chunk_number_diff: usize,
    chunk_index_diff: i64,
}

impl LaidOutTranslation {
    pub fn new(
        num_chunks: usize,
        chunk_size: ChunkSize,
        chunk_number_diff: i64,
        chunk_index_diff: i64,
    ) -> Self {
        assert!(num_chunks > 0);
        LaidOutTranslation {
            num_chunks,
            chunk_size,
            chunk_number_diff: chunk_number_diff.rem_euclid(num_chunks as i64) as usize,
            chunk_index_diff: chunk_index_diff.rem_euclid(chunk_size.value()),
        }
    }

    pub fn chunk_number_diff(&self) -> usize {
        self.chunk_number_diff
    }

    pub fn chunk_index_diff(&self) -> i64 {
        self.chunk_index_diff
    }

    pub fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> usize {
        self.num_chunks
    }
}

pub fn translation_src_dest(
    src: &LaidOutTensorIndex,
    dest: &LaidOutTensorIndex,
) -> LaidOutTranslation {
    assert!(src.chunk_size() == dest.chunk_size());
    LaidOutTranslation::new(
        src.total_chunks().max(dest.total_chunks()),
        src.chunk_size(),
        dest.chunk_number() as i64 - src.chunk_number() as i64,
        dest.chunk_index() - src.chunk_index(),
    )
}
