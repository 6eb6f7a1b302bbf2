//! 3MF package writer
//!
//! A 3MF file is a ZIP archive containing:
//! - `[Content_Types].xml` - MIME type mappings
//! - `_rels/.rels` - Relationships
//! - `3D/3dmodel.model` - the model XML, one mesh object per solid

use std::collections::HashMap;
use std::io::{Cursor, Seek, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::{ExportError, SolidMesh};

const NAMESPACE_3MF: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
</Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>"#;

/// Object names made unique by suffixing repeats: `Part`, `Part_2`, ...
pub fn unique_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut taken: Vec<String> = Vec::new();
    for name in names {
        let count = seen.entry(name).or_insert(0);
        *count += 1;
        let mut candidate = if *count == 1 {
            name.to_string()
        } else {
            format!("{}_{}", name, count)
        };
        // A literal "Part_2" earlier in the list must not collide
        while taken.contains(&candidate) {
            *count += 1;
            candidate = format!("{}_{}", name, count);
        }
        taken.push(candidate);
    }
    taken
}

/// Write a 3MF package with one object per mesh
pub fn write_3mf(
    title: &str,
    meshes: &[SolidMesh],
    out: &mut (impl Write + Seek),
) -> Result<(), ExportError> {
    let err = |what: &str, e: &dyn std::fmt::Display| ExportError::ThreeMf(format!("{what}: {e}"));

    let model_xml = model_xml(title, meshes)?;

    let mut zip = ZipWriter::new(out);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let entries = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.as_bytes()),
        ("_rels/.rels", RELS_XML.as_bytes()),
        ("3D/3dmodel.model", model_xml.as_slice()),
    ];
    for (name, content) in entries {
        zip.start_file(name, options)
            .map_err(|e| err(&format!("failed to create {name}"), &e))?;
        zip.write_all(content)
            .map_err(|e| err(&format!("failed to write {name}"), &e))?;
    }
    zip.finish()
        .map_err(|e| err("failed to finalize ZIP archive", &e))?;
    Ok(())
}

fn model_xml(title: &str, meshes: &[SolidMesh]) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    let mut writer = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);
    let w = &mut writer;

    emit(w, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut model = BytesStart::new("model");
    model.push_attribute(("xmlns", NAMESPACE_3MF));
    model.push_attribute(("unit", "millimeter"));
    model.push_attribute(("xml:lang", "en-US"));
    emit(w, Event::Start(model))?;

    let mut metadata = BytesStart::new("metadata");
    metadata.push_attribute(("name", "Title"));
    emit(w, Event::Start(metadata))?;
    emit(w, Event::Text(BytesText::new(title)))?;
    emit(w, Event::End(BytesEnd::new("metadata")))?;

    emit(w, Event::Start(BytesStart::new("resources")))?;
    let names = unique_names(meshes.iter().map(|m| m.name.as_str()));
    for (index, (solid, name)) in meshes.iter().zip(&names).enumerate() {
        let id = (index + 1).to_string();
        let mut object = BytesStart::new("object");
        object.push_attribute(("id", id.as_str()));
        object.push_attribute(("name", name.as_str()));
        object.push_attribute(("type", "model"));
        emit(w, Event::Start(object))?;
        emit(w, Event::Start(BytesStart::new("mesh")))?;

        emit(w, Event::Start(BytesStart::new("vertices")))?;
        for v in &solid.mesh.vertices {
            let mut vertex = BytesStart::new("vertex");
            vertex.push_attribute(("x", format!("{:.6}", v[0]).as_str()));
            vertex.push_attribute(("y", format!("{:.6}", v[1]).as_str()));
            vertex.push_attribute(("z", format!("{:.6}", v[2]).as_str()));
            emit(w, Event::Empty(vertex))?;
        }
        emit(w, Event::End(BytesEnd::new("vertices")))?;

        emit(w, Event::Start(BytesStart::new("triangles")))?;
        for tri in solid.mesh.indices.chunks_exact(3) {
            let mut triangle = BytesStart::new("triangle");
            triangle.push_attribute(("v1", tri[0].to_string().as_str()));
            triangle.push_attribute(("v2", tri[1].to_string().as_str()));
            triangle.push_attribute(("v3", tri[2].to_string().as_str()));
            emit(w, Event::Empty(triangle))?;
        }
        emit(w, Event::End(BytesEnd::new("triangles")))?;

        emit(w, Event::End(BytesEnd::new("mesh")))?;
        emit(w, Event::End(BytesEnd::new("object")))?;
    }
    emit(w, Event::End(BytesEnd::new("resources")))?;

    emit(w, Event::Start(BytesStart::new("build")))?;
    for index in 0..meshes.len() {
        let id = (index + 1).to_string();
        let mut item = BytesStart::new("item");
        item.push_attribute(("objectid", id.as_str()));
        emit(w, Event::Empty(item))?;
    }
    emit(w, Event::End(BytesEnd::new("build")))?;

    emit(w, Event::End(BytesEnd::new("model")))?;
    Ok(buffer)
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<(), ExportError> {
    writer
        .write_event(event)
        .map_err(|e| ExportError::ThreeMf(format!("failed to write model XML: {e}")))
}

#[cfg(test)]
mod tests {
    use super::super::tests::two_boxes;
    use super::super::{ExportFormat, export};
    use super::*;
    use std::io::Read;

    #[test]
    fn test_unique_names() {
        assert_eq!(
            unique_names(["Grid", "Wall", "Grid", "Grid"]),
            ["Grid", "Wall", "Grid_2", "Grid_3"]
        );
        assert_eq!(unique_names(["A_2", "A", "A"]), ["A_2", "A", "A_3"]);
    }

    #[test]
    fn test_package_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = export(&two_boxes(), ExportFormat::ThreeMf, &dir.path().join("boxes"))
            .unwrap();
        assert_eq!(path, dir.path().join("boxes.3mf"));

        let file = std::fs::File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        for name in ["[Content_Types].xml", "_rels/.rels", "3D/3dmodel.model"] {
            assert!(archive.by_name(name).is_ok(), "{name}");
        }

        let mut xml = String::new();
        archive
            .by_name("3D/3dmodel.model")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert!(xml.contains(r#"unit="millimeter""#));
        assert!(xml.contains(r#"<metadata name="Title">boxes</metadata>"#));
        assert!(xml.contains(r#"name="Base""#));
        assert!(xml.contains(r#"name="Base_2""#));
        assert_eq!(xml.matches("<object ").count(), 2);
        assert_eq!(xml.matches("<item ").count(), 2);
        assert_eq!(xml.matches("<triangle ").count(), 24);
    }
}
