//! Byte-level PDF builders for unit tests.

use flate2::Compression;

use crate::document::xref::find_startxref;
use crate::parser::filters::flate_encode;

#[derive(Clone)]
enum Body {
    Plain(String),
    Stream(Vec<u8>),
}

/// Writes small PDFs with exact offsets. Object `n` is `objects[n - 1]`.
#[derive(Clone)]
pub struct PdfBuilder {
    version: &'static str,
    objects: Vec<Body>,
    root: Option<u32>,
    trailer_extra: String,
    indirect_lengths: bool,
}

impl PdfBuilder {
    fn new(objects: Vec<Body>) -> Self {
        Self {
            version: "1.4",
            objects,
            root: Some(1),
            trailer_extra: String::new(),
            indirect_lengths: false,
        }
    }

    /// Catalog 1, page tree 2, page 3, content stream 4.
    pub fn single_page(content: &[u8]) -> Self {
        Self::new(vec![
            Body::Plain("<< /Type /Catalog /Pages 2 0 R >>".into()),
            Body::Plain("<< /Type /Pages /Kids [3 0 R] /Count 1 >>".into()),
            Body::Plain(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> /Contents 4 0 R >>"
                    .into(),
            ),
            Body::Stream(content.to_vec()),
        ])
    }

    /// Flat tree with `count` pages; page `i` is object `3 + 2i`, its
    /// content `4 + 2i`.
    pub fn with_pages(count: u32) -> Self {
        let kids: Vec<String> = (0..count).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
        let mut objects = vec![
            Body::Plain("<< /Type /Catalog /Pages 2 0 R >>".into()),
            Body::Plain(format!(
                "<< /Type /Pages /Kids [{}] /Count {count} /MediaBox [0 0 612 792] >>",
                kids.join(" ")
            )),
        ];
        for i in 0..count {
            objects.push(Body::Plain(format!(
                "<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>",
                4 + 2 * i
            )));
            objects.push(Body::Stream(format!("BT (page {i}) Tj ET").into_bytes()));
        }
        Self::new(objects)
    }

    /// Root 2 holds node 3 (pages 4, 6) and page 8. The root carries
    /// MediaBox and Resources, node 3 carries Rotate.
    pub fn nested() -> Self {
        Self::new(vec![
            Body::Plain("<< /Type /Catalog /Pages 2 0 R >>".into()),
            Body::Plain(
                "<< /Type /Pages /Kids [3 0 R 8 0 R] /Count 3 /MediaBox [0 0 595 842] /Resources << /ProcSet [/PDF] >> >>"
                    .into(),
            ),
            Body::Plain("<< /Type /Pages /Parent 2 0 R /Kids [4 0 R 6 0 R] /Count 2 /Rotate 90 >>".into()),
            Body::Plain("<< /Type /Page /Parent 3 0 R /Contents 5 0 R >>".into()),
            Body::Stream(b"BT (one) Tj ET".to_vec()),
            Body::Plain("<< /Type /Page /Parent 3 0 R /Contents 7 0 R >>".into()),
            Body::Stream(b"BT (two) Tj ET".to_vec()),
            Body::Plain("<< /Type /Page /Parent 2 0 R /Contents 9 0 R >>".into()),
            Body::Stream(b"BT (three) Tj ET".to_vec()),
        ])
    }

    /// Node 3 lists the root as its own kid.
    pub fn cyclic() -> Self {
        Self::new(vec![
            Body::Plain("<< /Type /Catalog /Pages 2 0 R >>".into()),
            Body::Plain("<< /Type /Pages /Kids [3 0 R] /Count 1 >>".into()),
            Body::Plain("<< /Type /Pages /Parent 2 0 R /Kids [2 0 R] /Count 1 >>".into()),
        ])
    }

    /// Replace the body of object `num`.
    pub fn replace_object(mut self, num: u32, body: &str) -> Self {
        self.objects[num as usize - 1] = Body::Plain(body.into());
        self
    }

    /// Append an object, numbered after the existing ones.
    pub fn add_object(mut self, body: &str) -> Self {
        self.objects.push(Body::Plain(body.into()));
        self
    }

    /// Extra trailer entries, written verbatim.
    pub fn trailer_extra(mut self, extra: &str) -> Self {
        self.trailer_extra = extra.into();
        self
    }

    /// Drop `/Root` from the trailer.
    pub fn without_root(mut self) -> Self {
        self.root = None;
        self
    }

    /// Store every stream `/Length` in its own object, appended at the end.
    pub fn indirect_lengths(mut self) -> Self {
        self.indirect_lengths = true;
        self
    }

    fn header(&self) -> Vec<u8> {
        let mut out = format!("%PDF-{}\n", self.version).into_bytes();
        out.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");
        out
    }

    fn write_object(out: &mut Vec<u8>, num: u32, body: &[u8]) -> usize {
        let offset = out.len();
        out.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
        offset
    }

    fn stream_body(dict_tail: &str, length: &str, content: &[u8]) -> Vec<u8> {
        let mut body = format!("<< {dict_tail}/Length {length} >>\nstream\n").into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(b"\nendstream");
        body
    }

    /// Classic cross-reference table.
    pub fn build(&self) -> Vec<u8> {
        let mut out = self.header();
        let mut offsets = Vec::new();
        let mut lengths = Vec::new();
        let count = self.objects.len() as u32;

        for (i, body) in self.objects.iter().enumerate() {
            let num = i as u32 + 1;
            let bytes = match body {
                Body::Plain(text) => text.clone().into_bytes(),
                Body::Stream(content) if self.indirect_lengths => {
                    let length_num = count + 1 + lengths.len() as u32;
                    lengths.push(content.len());
                    Self::stream_body("", &format!("{length_num} 0 R"), content)
                }
                Body::Stream(content) => Self::stream_body("", &content.len().to_string(), content),
            };
            offsets.push(Self::write_object(&mut out, num, &bytes));
        }
        for (i, length) in lengths.iter().enumerate() {
            let num = count + 1 + i as u32;
            offsets.push(Self::write_object(&mut out, num, length.to_string().as_bytes()));
        }

        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in &offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        let root = self
            .root
            .map(|r| format!(" /Root {r} 0 R"))
            .unwrap_or_default();
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {}{root} {} >>\nstartxref\n{xref_offset}\n%%EOF\n",
                offsets.len() + 1,
                self.trailer_extra
            )
            .as_bytes(),
        );
        out
    }

    /// PDF 1.5 layout: non-stream objects packed into one Flate object
    /// stream, indexed by a Flate cross-reference stream.
    pub fn build_compressed(&self) -> Vec<u8> {
        let mut builder = self.clone();
        builder.version = "1.5";
        let mut out = builder.header();

        let count = self.objects.len() as u32;
        let objstm_num = count + 1;
        let xref_num = count + 2;

        // (type, field 2, field 3) per object number, 0 being the free head.
        let mut rows: Vec<(u8, u32, u16)> = vec![(0, 0, 0xffff)];
        let mut packed_header = String::new();
        let mut packed_body = Vec::new();
        let mut packed = 0u16;

        for (i, body) in self.objects.iter().enumerate() {
            let num = i as u32 + 1;
            match body {
                Body::Plain(text) => {
                    packed_header.push_str(&format!("{num} {} ", packed_body.len()));
                    packed_body.extend_from_slice(text.as_bytes());
                    packed_body.push(b'\n');
                    rows.push((2, objstm_num, packed));
                    packed += 1;
                }
                Body::Stream(content) => {
                    let bytes = Self::stream_body("", &content.len().to_string(), content);
                    let offset = Self::write_object(&mut out, num, &bytes);
                    rows.push((1, offset as u32, 0));
                }
            }
        }

        let mut decoded = packed_header.into_bytes();
        let first = decoded.len();
        decoded.extend_from_slice(&packed_body);
        let compressed = flate_encode(&decoded, Compression::default()).unwrap_or_default();
        let bytes = Self::stream_body(
            &format!("/Type /ObjStm /N {packed} /First {first} /Filter /FlateDecode "),
            &compressed.len().to_string(),
            &compressed,
        );
        let objstm_offset = Self::write_object(&mut out, objstm_num, &bytes);
        rows.push((1, objstm_offset as u32, 0));

        let xref_offset = out.len();
        rows.push((1, xref_offset as u32, 0));
        let mut raw = Vec::new();
        for (kind, f2, f3) in &rows {
            raw.push(*kind);
            raw.extend_from_slice(&f2.to_be_bytes());
            raw.extend_from_slice(&f3.to_be_bytes());
        }
        let compressed = flate_encode(&raw, Compression::default()).unwrap_or_default();
        let root = self
            .root
            .map(|r| format!("/Root {r} 0 R "))
            .unwrap_or_default();
        let bytes = Self::stream_body(
            &format!(
                "/Type /XRef /W [1 4 2] /Size {} {root}/Filter /FlateDecode ",
                rows.len()
            ),
            &compressed.len().to_string(),
            &compressed,
        );
        Self::write_object(&mut out, xref_num, &bytes);
        out.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());
        out
    }

    /// Append an incremental update that redefines object `num`.
    ///
    /// The update's trailer carries only `/Size` and `/Prev`.
    pub fn append_update(base: &[u8], num: u32, body: &[u8]) -> Vec<u8> {
        let prev = find_startxref(base).unwrap_or(0);
        let mut out = base.to_vec();
        let offset = Self::write_object(&mut out, num, body);
        let xref_offset = out.len();
        out.extend_from_slice(
            format!(
                "xref\n{num} 1\n{offset:010} 00000 n \ntrailer\n<< /Size {} /Prev {prev} >>\nstartxref\n{xref_offset}\n%%EOF\n",
                num + 1
            )
            .as_bytes(),
        );
        out
    }
}

/// A file whose only content is one uncompressed `/W [1 4 2]` xref stream.
pub fn xref_stream_object(rows: &[u8], size: u32, index: Option<&str>) -> Vec<u8> {
    let mut out = b"%PDF-1.5\n".to_vec();
    let offset = out.len();
    let index = index.map(|i| format!("/Index {i} ")).unwrap_or_default();
    let body = PdfBuilder::stream_body(
        &format!("/Type /XRef /W [1 4 2] /Size {size} {index}"),
        &rows.len().to_string(),
        rows,
    );
    PdfBuilder::write_object(&mut out, 99, &body);
    out.extend_from_slice(format!("startxref\n{offset}\n%%EOF\n").as_bytes());
    out
}
