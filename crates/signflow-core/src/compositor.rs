//! PDF compositor
//!
//! Produces the final signed PDF: each signer's raster signature is
//! embedded once as an image XObject (reused across all of that
//! signer's boxes) and drawn at the pixel rectangle the geometry model
//! computes for each box. The mutated document is then re-serialized.
//!
//! A box whose signer has no signature image is silently skipped, so a
//! partial composite is safe to invoke; the workflow only triggers the
//! full composite once every signer has signed.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use sha2::{Digest, Sha256};

use crate::error::ComposeError;
use crate::geometry::pixel_rect;
use crate::model::SignatureBox;

/// US Letter, used when a page carries no resolvable MediaBox.
const FALLBACK_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

/// Composite signature images onto the original PDF.
///
/// `signatures` maps signer email to PNG bytes. Output is
/// placement-deterministic for fixed inputs; byte-for-byte container
/// determinism is not guaranteed.
pub fn compose(
    pdf_bytes: &[u8],
    boxes: &[SignatureBox],
    signatures: &HashMap<String, Vec<u8>>,
) -> Result<Vec<u8>, ComposeError> {
    let mut doc = Document::load_mem(pdf_bytes)
        .map_err(|e| ComposeError::MalformedDocument(e.to_string()))?;

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let page_count = pages.len() as u32;

    // Content digest per signer: identical images embed once and the
    // XObject is shared across every box that uses them.
    let digests: HashMap<&String, String> = signatures
        .iter()
        .map(|(email, png)| (email, hex::encode(Sha256::digest(png))))
        .collect();

    let mut embedded: HashMap<String, (String, ObjectId)> = HashMap::new();
    let mut page_ops: BTreeMap<usize, String> = BTreeMap::new();

    for bx in boxes {
        let Some(png_bytes) = signatures.get(&bx.signer_email) else {
            continue;
        };
        if bx.page == 0 || bx.page > page_count {
            return Err(ComposeError::PageOutOfRange {
                page: bx.page,
                page_count,
            });
        }
        let page_index = (bx.page - 1) as usize;

        let digest = &digests[&bx.signer_email];
        if !embedded.contains_key(digest) {
            let image = decode_png(png_bytes)?;
            let name = format!("Sig{}", embedded.len());
            let id = embed_image(&mut doc, &image)?;
            embedded.insert(digest.clone(), (name, id));
        }
        let (name, xobject_id) = embedded[digest].clone();

        let page_id = pages[page_index];
        let (page_w, page_h) = page_size(&doc, page_id);
        let rect = pixel_rect(bx, page_w, page_h);

        add_xobject_resource(&mut doc, page_id, &name, xobject_id)?;
        let ops = page_ops.entry(page_index).or_default();
        ops.push_str(&format!(
            "q\n{:.4} 0 0 {:.4} {:.4} {:.4} cm\n/{} Do\nQ\n",
            rect.width, rect.height, rect.x, rect.y, name
        ));
    }

    for (page_index, ops) in page_ops {
        append_content(&mut doc, pages[page_index], ops)?;
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ComposeError::SerializationError(e.to_string()))?;
    Ok(out)
}

struct DecodedImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Vec<u8>,
}

fn decode_png(bytes: &[u8]) -> Result<DecodedImage, ComposeError> {
    let invalid = |e: &dyn std::fmt::Display| ComposeError::InvalidSignatureImage(e.to_string());

    let decoder = png::Decoder::new(bytes);
    let mut reader = decoder.read_info().map_err(|e| invalid(&e))?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).map_err(|e| invalid(&e))?;
    if info.bit_depth != png::BitDepth::Eight {
        return Err(ComposeError::InvalidSignatureImage(
            "only 8-bit PNGs are supported".into(),
        ));
    }
    let data = &buf[..info.buffer_size()];
    let pixel_count = (info.width * info.height) as usize;

    let (rgb, alpha) = match info.color_type {
        png::ColorType::Rgba => {
            let mut rgb = Vec::with_capacity(pixel_count * 3);
            let mut alpha = Vec::with_capacity(pixel_count);
            for px in data.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
                alpha.push(px[3]);
            }
            (rgb, alpha)
        }
        png::ColorType::Rgb => (data.to_vec(), vec![255; pixel_count]),
        png::ColorType::Grayscale => {
            let mut rgb = Vec::with_capacity(pixel_count * 3);
            for &g in data {
                rgb.extend_from_slice(&[g, g, g]);
            }
            (rgb, vec![255; pixel_count])
        }
        png::ColorType::GrayscaleAlpha => {
            let mut rgb = Vec::with_capacity(pixel_count * 3);
            let mut alpha = Vec::with_capacity(pixel_count);
            for px in data.chunks_exact(2) {
                rgb.extend_from_slice(&[px[0], px[0], px[0]]);
                alpha.push(px[1]);
            }
            (rgb, alpha)
        }
        png::ColorType::Indexed => {
            return Err(ComposeError::InvalidSignatureImage(
                "indexed-color PNGs are not supported".into(),
            ));
        }
    };

    Ok(DecodedImage {
        width: info.width,
        height: info.height,
        rgb,
        alpha,
    })
}

/// Embed a decoded image as a FlateDecode RGB XObject with a DeviceGray
/// soft mask carrying the alpha channel.
fn embed_image(doc: &mut Document, image: &DecodedImage) -> Result<ObjectId, ComposeError> {
    let mut smask = Dictionary::new();
    smask.set("Type", Object::Name(b"XObject".to_vec()));
    smask.set("Subtype", Object::Name(b"Image".to_vec()));
    smask.set("Width", Object::Integer(image.width as i64));
    smask.set("Height", Object::Integer(image.height as i64));
    smask.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
    smask.set("BitsPerComponent", Object::Integer(8));
    smask.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    let smask_id = doc.add_object(Object::Stream(Stream::new(smask, deflate(&image.alpha)?)));

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(image.width as i64));
    dict.set("Height", Object::Integer(image.height as i64));
    dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    dict.set("SMask", Object::Reference(smask_id));
    Ok(doc.add_object(Object::Stream(Stream::new(dict, deflate(&image.rgb)?))))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, ComposeError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| ComposeError::SerializationError(e.to_string()))
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Page width/height from the MediaBox, walking the Pages-tree Parent
/// chain for inherited boxes. Falls back to US Letter.
fn page_size(doc: &Document, page_id: ObjectId) -> (f64, f64) {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Some(dict) = doc.get_object(id).ok().and_then(|o| o.as_dict().ok()) else {
            break;
        };
        if let Ok(mb) = dict.get(b"MediaBox") {
            if let Some(size) = media_box_size(doc, mb) {
                return size;
            }
        }
        current = dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok());
    }
    FALLBACK_PAGE_SIZE
}

fn media_box_size(doc: &Document, obj: &Object) -> Option<(f64, f64)> {
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = obj.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let n: Vec<f64> = arr.iter().filter_map(number).collect();
    if n.len() != 4 {
        return None;
    }
    Some(((n[2] - n[0]).abs(), (n[3] - n[1]).abs()))
}

/// Register an XObject under the page's Resources, preserving inherited
/// resources by materializing them onto the page.
fn add_xobject_resource(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    xobject_id: ObjectId,
) -> Result<(), ComposeError> {
    let mut resources = resolved_resources(doc, page_id).unwrap_or_default();
    let mut xobjects = match resources.get(b"XObject") {
        Ok(Object::Dictionary(d)) => d.clone(),
        Ok(Object::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|o| o.as_dict().ok().cloned())
            .unwrap_or_default(),
        _ => Dictionary::new(),
    };
    xobjects.set(name, Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    doc.get_object_mut(page_id)
        .map_err(|e| ComposeError::MalformedDocument(e.to_string()))?
        .as_dict_mut()
        .map_err(|e| ComposeError::MalformedDocument(e.to_string()))?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

fn resolved_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc.get_object(id).ok().and_then(|o| o.as_dict().ok())?;
        if let Ok(res) = dict.get(b"Resources") {
            return match res {
                Object::Dictionary(d) => Some(d.clone()),
                Object::Reference(id) => doc
                    .get_object(*id)
                    .ok()
                    .and_then(|o| o.as_dict().ok().cloned()),
                _ => None,
            };
        }
        current = dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok());
    }
    None
}

/// Append a drawing stream after the page's existing content.
fn append_content(doc: &mut Document, page_id: ObjectId, ops: String) -> Result<(), ComposeError> {
    let stream_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        ops.into_bytes(),
    )));

    let existing = doc
        .get_object(page_id)
        .ok()
        .and_then(|o| o.as_dict().ok())
        .and_then(|d| d.get(b"Contents").ok())
        .cloned();

    let contents = match existing {
        Some(Object::Reference(id)) => {
            Object::Array(vec![Object::Reference(id), Object::Reference(stream_id)])
        }
        Some(Object::Array(mut arr)) => {
            arr.push(Object::Reference(stream_id));
            Object::Array(arr)
        }
        _ => Object::Reference(stream_id),
    };

    doc.get_object_mut(page_id)
        .map_err(|e| ComposeError::MalformedDocument(e.to_string()))?
        .as_dict_mut()
        .map_err(|e| ComposeError::MalformedDocument(e.to_string()))?
        .set("Contents", contents);
    Ok(())
}
