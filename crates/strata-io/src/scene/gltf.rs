// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! glTF 2.0 import, for both `.gltf` (JSON) and `.glb` (binary) files.

use super::{EmbeddedImage, ImageRef, ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene};
use crate::error::ImportError;
use base64::Engine;
use gltf::buffer::Source as BufferSource;
use gltf::image::Source as ImageSource;
use std::path::Path;
use strata_core::math::Mat4;
use strata_core::vfs::{FileSystemService, FsTag};

/// Turns glTF documents into [`ImportedScene`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneImporter;

impl SceneImporter {
    /// File extensions the importer recognizes.
    pub const EXTENSIONS: &'static [&'static str] = &["gltf", "glb"];

    /// Returns `true` if `hint` is a scene extension.
    pub fn supports(hint: &str) -> bool {
        Self::EXTENSIONS
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(hint))
    }

    /// Reads and imports `path` from the mount `tag`.
    ///
    /// External buffers are resolved relative to the scene file on the same
    /// mount.
    pub fn import(
        &self,
        fs: &FileSystemService,
        tag: FsTag,
        path: impl AsRef<Path>,
    ) -> Result<ImportedScene, ImportError> {
        let path = path.as_ref();
        let bytes = fs.read_file(tag, path)?;
        let base = path.parent().unwrap_or(Path::new(""));
        self.import_slice(&bytes, |uri| Ok(fs.read_file(tag, base.join(uri))?))
    }

    /// Imports an in-memory document. `resolve` loads external buffers by URI.
    ///
    /// ## Errors
    /// [`ImportError::Parse`] for a malformed document,
    /// [`ImportError::Buffer`] when a buffer cannot be loaded and
    /// [`ImportError::MissingPositions`] for a primitive without positions.
    pub fn import_slice<R>(&self, bytes: &[u8], resolve: R) -> Result<ImportedScene, ImportError>
    where
        R: Fn(&str) -> Result<Vec<u8>, ImportError>,
    {
        let gltf = gltf::Gltf::from_slice(bytes)?;
        let buffers = load_buffers(&gltf, &resolve)?;

        let mut scene = ImportedScene::default();
        scene.images = embedded_images(&gltf, &buffers)?;
        let image_refs = image_refs(&gltf);

        scene.materials = gltf
            .materials()
            .map(|material| {
                let pbr = material.pbr_metallic_roughness();
                ImportedMaterial {
                    name: material.name().map(str::to_string),
                    base_color: pbr.base_color_factor(),
                    color_texture: pbr
                        .base_color_texture()
                        .and_then(|info| image_refs.get(info.texture().source().index()).cloned()),
                    normal_texture: material
                        .normal_texture()
                        .and_then(|info| image_refs.get(info.texture().source().index()).cloned()),
                }
            })
            .collect();

        // Sub-mesh ids of every glTF mesh, for the node pass.
        let mut mesh_ranges: Vec<Vec<u32>> = Vec::with_capacity(gltf.meshes().len());
        let mut default_material = None;
        for mesh in gltf.meshes() {
            let mut ids = Vec::new();
            for primitive in mesh.primitives() {
                let name = format!("{}#{}", mesh.name().unwrap_or("mesh"), primitive.index());
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    log::warn!("Skipping {:?} primitive '{name}'.", primitive.mode());
                    continue;
                }
                let material = match primitive.material().index() {
                    Some(index) => index as u32,
                    None => *default_material.get_or_insert_with(|| {
                        scene.materials.push(ImportedMaterial::default());
                        scene.materials.len() as u32 - 1
                    }),
                };
                let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
                let positions: Vec<[f32; 3]> = reader
                    .read_positions()
                    .ok_or_else(|| ImportError::MissingPositions { mesh: name.clone() })?
                    .collect();
                let indices = match reader.read_indices() {
                    Some(indices) => indices.into_u32().collect(),
                    None => (0..positions.len() as u32).collect(),
                };
                ids.push(scene.meshes.len() as u32);
                scene.meshes.push(ImportedMesh {
                    name,
                    indices,
                    normals: reader.read_normals().map(Iterator::collect),
                    tex_coords: reader.read_tex_coords(0).map(|t| t.into_f32().collect()),
                    tangents: reader.read_tangents().map(Iterator::collect),
                    positions,
                    material,
                });
            }
            mesh_ranges.push(ids);
        }

        scene.nodes = gltf
            .nodes()
            .map(|node| ImportedNode {
                name: node.name().map(str::to_string),
                local: Mat4::from_cols_array_2d(&node.transform().matrix()),
                parent: None,
                meshes: node
                    .mesh()
                    .and_then(|m| mesh_ranges.get(m.index()).cloned())
                    .unwrap_or_default(),
            })
            .collect();
        for node in gltf.nodes() {
            for child in node.children() {
                scene.nodes[child.index()].parent = Some(node.index());
            }
        }

        log::debug!(
            "Imported glTF: {} sub-mesh(es), {} material(s), {} node(s), {} embedded image(s).",
            scene.meshes.len(),
            scene.materials.len(),
            scene.nodes.len(),
            scene.images.len()
        );
        Ok(scene)
    }
}

fn load_buffers<R>(gltf: &gltf::Gltf, resolve: &R) -> Result<Vec<Vec<u8>>, ImportError>
where
    R: Fn(&str) -> Result<Vec<u8>, ImportError>,
{
    gltf.buffers()
        .map(|buffer| {
            let mut data = match buffer.source() {
                BufferSource::Bin => gltf.blob.clone().ok_or_else(|| ImportError::Buffer {
                    index: buffer.index(),
                    reason: "the binary chunk is missing".into(),
                })?,
                BufferSource::Uri(uri) if uri.starts_with("data:") => decode_data_uri(uri)?.1,
                BufferSource::Uri(uri) => resolve(uri).map_err(|e| ImportError::Buffer {
                    index: buffer.index(),
                    reason: e.to_string(),
                })?,
            };
            if data.len() < buffer.length() {
                return Err(ImportError::Buffer {
                    index: buffer.index(),
                    reason: format!("{} bytes, expected {}", data.len(), buffer.length()),
                });
            }
            // GLB chunks are padded to four bytes.
            data.truncate(buffer.length());
            Ok(data)
        })
        .collect()
}

/// Splits a base64 `data:` URI into its media type and payload.
fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), ImportError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| ImportError::DataUri(uri.chars().take(48).collect()))?;
    let (media, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| ImportError::DataUri(uri.chars().take(48).collect()))?;
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload)?;
    Ok((media.to_string(), bytes))
}

fn hint_from_mime(mime: &str) -> String {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg".into(),
        other => other.strip_prefix("image/").unwrap_or(other).to_ascii_lowercase(),
    }
}

/// How each glTF image is reached, by image index.
fn image_refs(gltf: &gltf::Gltf) -> Vec<ImageRef> {
    let mut embedded = 0;
    gltf.images()
        .map(|image| match image.source() {
            ImageSource::Uri { uri, .. } if !uri.starts_with("data:") => {
                ImageRef::External(uri.to_string())
            }
            _ => {
                embedded += 1;
                ImageRef::Embedded(embedded - 1)
            }
        })
        .collect()
}

fn embedded_images(gltf: &gltf::Gltf, buffers: &[Vec<u8>]) -> Result<Vec<EmbeddedImage>, ImportError> {
    let mut images = Vec::new();
    for image in gltf.images() {
        let (hint, data) = match image.source() {
            ImageSource::View { view, mime_type } => {
                let buffer = buffers.get(view.buffer().index()).ok_or(ImportError::Buffer {
                    index: view.buffer().index(),
                    reason: "referenced by an image but not loaded".into(),
                })?;
                let range = view.offset()..view.offset() + view.length();
                let bytes = buffer.get(range).ok_or(ImportError::Buffer {
                    index: view.buffer().index(),
                    reason: format!("image view {} is out of range", view.index()),
                })?;
                (hint_from_mime(mime_type), bytes.to_vec())
            }
            ImageSource::Uri { uri, .. } if uri.starts_with("data:") => {
                let (media, bytes) = decode_data_uri(uri)?;
                (hint_from_mime(&media), bytes)
            }
            ImageSource::Uri { .. } => continue,
        };
        images.push(EmbeddedImage {
            name: format!("*{}", images.len()),
            format_hint: hint,
            data,
        });
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One triangle with normals, plus one index-less triangle without.
    fn document() -> Vec<u8> {
        let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let normals: [[f32; 3]; 3] = [[0.0, 0.0, 1.0]; 3];
        let indices: [u16; 4] = [0, 1, 2, 0];
        let mut bin = Vec::new();
        positions.iter().flatten().for_each(|f| bin.extend(f.to_le_bytes()));
        normals.iter().flatten().for_each(|f| bin.extend(f.to_le_bytes()));
        indices.iter().for_each(|i| bin.extend(i.to_le_bytes()));
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bin)
        );

        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [
    {{ "name": "root", "translation": [0, 0, -5], "children": [1], "mesh": 0 }},
    {{ "name": "child", "scale": [2, 2, 2], "mesh": 1 }}
  ],
  "materials": [{{ "name": "red", "pbrMetallicRoughness": {{ "baseColorFactor": [1, 0, 0, 1] }} }}],
  "meshes": [
    {{ "name": "tri", "primitives": [{{ "attributes": {{ "POSITION": 0, "NORMAL": 1 }}, "indices": 2, "material": 0 }}] }},
    {{ "name": "bare", "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}
  ],
  "buffers": [{{ "byteLength": {len}, "uri": "{uri}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 72, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 1, 0] }},
    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" }},
    {{ "bufferView": 2, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
            len = bin.len(),
        )
        .into_bytes()
    }

    fn no_external(uri: &str) -> Result<Vec<u8>, ImportError> {
        Err(ImportError::DataUri(uri.to_string()))
    }

    #[test]
    fn imports_meshes_materials_and_hierarchy() {
        let scene = SceneImporter.import_slice(&document(), no_external).unwrap();

        assert_eq!(scene.meshes.len(), 2);
        let tri = &scene.meshes[0];
        assert_eq!(tri.indices, vec![0, 1, 2]);
        assert_eq!(tri.material, 0);
        assert_eq!(tri.normals.as_ref().map(Vec::len), Some(3));
        assert!(tri.tex_coords.is_none());

        let bare = &scene.meshes[1];
        assert_eq!(bare.indices, vec![0, 1, 2]);
        assert!(bare.normals.is_none());
        // The primitive without a material gets an appended default one.
        assert_eq!(bare.material, 1);
        assert_eq!(scene.materials.len(), 2);
        assert_eq!(scene.materials[0].base_color, [1.0, 0.0, 0.0, 1.0]);

        assert_eq!(scene.nodes[1].parent, Some(0));
        assert_eq!(scene.nodes[1].meshes, vec![1]);
        let p = scene.world_transform(1).transform_point3(strata_core::math::Vec3::X);
        assert_eq!(p, strata_core::math::Vec3::new(2.0, 0.0, -5.0));
    }

    #[test]
    fn data_uris_are_decoded() {
        let (media, bytes) = decode_data_uri("data:image/png;base64,AQID").unwrap();
        assert_eq!(media, "image/png");
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(hint_from_mime(&media), "png");
        assert!(decode_data_uri("data:text/plain,hello").is_err());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            SceneImporter.import_slice(b"not a gltf", no_external),
            Err(ImportError::Parse(_))
        ));
    }
}
