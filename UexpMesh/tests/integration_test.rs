use std::fs;
use std::io::Cursor;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use glam::{Quat, Vec3};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use uexpmesh::formats::io::WriteBinaryExt;
use uexpmesh::formats::uasset::{HEADER_SIZE, PACKAGE_MAGIC, SUPPORTED_VERSION, UassetHeader};
use uexpmesh::mesh::buffer::{
    Buffer, ColorVertexBuffer, KdiBuffer, PositionVertexBuffer, SkeletalIndexBuffer,
    SkeletalMeshVertexBuffer, SkinWeightVertexBuffer, SkinWeights, StaticIndexBuffer,
    StaticMeshVertexBuffer, UvPrecision,
};
use uexpmesh::mesh::{Bone, BoneIndexEntry, SkeletalSection, StaticSection};
use uexpmesh::prelude::*;

const USER_DATA: &str = "EndEmissiveColorUserData";
const EXPORT_TAIL: [u8; 12] = [0x5A; 12];

// ==================== Fixture builders ====================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Encode a `.uasset`/`.uexp` pair holding `exports` as `(name_id, payload)`.
fn encode_container(names: &[&str], exports: &[(u32, Vec<u8>)], author: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let uasset_with = |offsets: &[u32], bulk_data_offset: u32| {
        let mut names_bytes = Vec::new();
        for name in names {
            names_bytes.write_str(name).unwrap();
            names_bytes.extend_from_slice(&[0x10, 0x20, 0x30, 0x40]);
        }
        let header = UassetHeader {
            version: SUPPORTED_VERSION,
            file_size: 0,
            package_flags: [0, 0, 0, 0x80],
            name_count: names.len() as u32,
            name_offset: HEADER_SIZE,
            export_count: exports.len() as u32,
            export_offset: HEADER_SIZE + names_bytes.len() as u32,
            import_count: 0,
            import_offset: 0,
            unknown1: [0; 4],
            guid: [0x42; 16],
            unknown2: [0; 8],
            unknown3: [0; 4],
            padding_offset: 0,
            bulk_data_offset,
            unknown5: [0; 4],
            file_data_offset: 0,
        };
        let mut out = Vec::new();
        header.write(&mut out).unwrap();
        out.extend_from_slice(&names_bytes);
        for ((name_id, payload), &offset) in exports.iter().zip(offsets) {
            Export {
                unknown1: [0; 16],
                name_id: *name_id,
                unknown2: [0; 8],
                size: payload.len() as u32,
                offset,
                unknown3: [0; 64],
                name: String::new(),
                kind: ExportKind::Opaque,
            }
            .write(&mut out)
            .unwrap();
        }
        out.extend_from_slice(&[0xEE; 8]);
        out
    };

    let base = uasset_with(&vec![0; exports.len()], 0).len() as u32;
    let mut offsets = Vec::new();
    let mut uexp = Vec::new();
    for (_, payload) in exports {
        offsets.push(base + uexp.len() as u32);
        uexp.extend_from_slice(payload);
    }
    uexp.extend_from_slice(author);
    uexp.extend_from_slice(&PACKAGE_MAGIC);
    let total = base + uexp.len() as u32;
    (uasset_with(&offsets, total - 4), uexp)
}

fn write_container(dir: &Path, stem: &str, (uasset, uexp): &(Vec<u8>, Vec<u8>)) -> std::path::PathBuf {
    fs::write(dir.join(format!("{stem}.uasset")), uasset).unwrap();
    let path = dir.join(format!("{stem}.uexp"));
    fs::write(&path, uexp).unwrap();
    path
}

fn materials_bytes(out: &mut Vec<u8>, slot_name_ids: &[u32]) {
    out.write_u32::<LittleEndian>(slot_name_ids.len() as u32).unwrap();
    for &slot_name_id in slot_name_ids {
        Material {
            import_index: -1,
            slot_name_id,
            slot_name_number: 0,
            unknown: [0; 24],
            slot_name: String::new(),
        }
        .write(out)
        .unwrap();
    }
}

fn empty(stride: u32) -> Buffer {
    Buffer::new(stride, Vec::new()).unwrap()
}

/// A skeletal LOD with one section and no vertices.
fn skeletal_lod_bytes(kdi_entries: usize, with_colors: bool) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_u16::<LittleEndian>(1).unwrap();
    out.write_u32::<LittleEndian>(1).unwrap();
    SkeletalSection {
        material_id: 0,
        first_index_id: 0,
        face_count: 0,
        flags: [7, 7],
        first_vertex_id: 0,
        vertex_group: vec![0],
        vertex_count: 0,
        max_bone_influences: 0,
        unknown: [9; 8],
        kdi: vec![0x11; kdi_entries * 16],
    }
    .write(&mut out)
    .unwrap();
    SkeletalIndexBuffer { buffer: empty(2) }.write(&mut out).unwrap();
    out.write_u32::<LittleEndian>(1).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u32::<LittleEndian>(0).unwrap();
    out.write_u32::<LittleEndian>(0).unwrap(); // vertex count
    out.write_u32::<LittleEndian>(1).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u32::<LittleEndian>(1).unwrap(); // uv count
    SkeletalMeshVertexBuffer { uv_count: 1, precision: UvPrecision::Half, buffer: empty(24) }
        .write(&mut out)
        .unwrap();
    SkinWeightVertexBuffer { extra_bone: false, buffer: empty(8) }.write(&mut out).unwrap();
    if with_colors {
        ColorVertexBuffer { buffer: empty(4) }.write(&mut out).unwrap();
    }
    SkeletalIndexBuffer { buffer: empty(2) }.write(&mut out).unwrap();
    if kdi_entries > 0 {
        KdiBuffer { buffer: Buffer::new(16, vec![0x22; kdi_entries * 16]).unwrap() }
            .write(&mut out)
            .unwrap();
        KdiBuffer { buffer: empty(16) }.write(&mut out).unwrap();
    }
    out
}

fn skeletal_payload(materials: &[u32], bones: &[(u32, i32)], lods: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    materials_bytes(&mut out, materials);
    Skeleton {
        bones: bones
            .iter()
            .map(|&(name_id, parent)| Bone {
                name_id,
                instance: 0,
                parent,
                rotation: Quat::IDENTITY,
                position: Vec3::new(0.0, 0.0, 10.0),
                scale: Vec3::ONE,
                name: String::new(),
            })
            .collect(),
        name_to_index: bones
            .iter()
            .enumerate()
            .map(|(i, &(name_id, _))| BoneIndexEntry { name_id, instance: 0, index: i as i32 })
            .collect(),
    }
    .write(&mut out)
    .unwrap();
    out.write_u32::<LittleEndian>(lods.len() as u32).unwrap();
    for lod in lods {
        out.extend_from_slice(lod);
    }
    out.extend_from_slice(&EXPORT_TAIL);
    out
}

/// `SK_Hero`: bones root/spine/arm, materials Body/Hair, a user-data export first.
fn hero(lods: &[Vec<u8>]) -> (Vec<u8>, Vec<u8>) {
    let names = ["None", "SkeletalMesh", "SK_Hero", USER_DATA, "root", "spine", "arm", "Body", "Hair"];
    let mesh = skeletal_payload(&[7, 8], &[(4, -1), (5, 0), (6, 1)], lods);
    encode_container(&names, &[(3, vec![1, 2, 3, 4]), (2, mesh)], b"")
}

/// `SK_Donor`: bones root/arm, material Hair.
fn donor(lods: &[Vec<u8>]) -> (Vec<u8>, Vec<u8>) {
    let names = ["None", "SkeletalMesh", "SK_Donor", "root", "arm", "Hair"];
    let mesh = skeletal_payload(&[5], &[(3, -1), (4, 0)], lods);
    encode_container(&names, &[(2, mesh)], b"donor")
}

/// A static LOD with one section and no vertices. `feature_flag` fills the
/// word that selects adjacency/reversed index buffers.
fn static_lod_bytes(feature_flag: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_u16::<LittleEndian>(1).unwrap();
    out.write_u32::<LittleEndian>(1).unwrap();
    StaticSection {
        material_id: 0,
        first_index_id: 0,
        face_count: 0,
        first_vertex_id: 0,
        max_vertex_id: 0,
        flags: [3; 12],
    }
    .write(&mut out)
    .unwrap();
    out.extend_from_slice(&[1, 0, 0, 0]);
    PositionVertexBuffer { buffer: empty(12) }.write(&mut out).unwrap();
    StaticMeshVertexBuffer { uv_count: 1, precision: UvPrecision::Half, buffer: empty(12) }
        .write(&mut out)
        .unwrap();
    out.write_u32::<LittleEndian>(1).unwrap();
    out.extend_from_slice(&[0; 6]);
    StaticIndexBuffer { wide: false, buffer: empty(2) }.write(&mut out).unwrap();
    out.write_u32_slice(&[0, 1, feature_flag]).unwrap();
    StaticIndexBuffer { wide: false, buffer: empty(2) }.write(&mut out).unwrap();
    out.extend_from_slice(&[7; 48]);
    out
}

/// `SM_Rock`: materials Rock/Moss.
fn rock(lods: &[Vec<u8>]) -> (Vec<u8>, Vec<u8>) {
    let names = ["None", "StaticMesh", "SM_Rock", USER_DATA, "Rock", "Moss"];
    let mut mesh = Vec::new();
    materials_bytes(&mut mesh, &[4, 5]);
    mesh.write_u32::<LittleEndian>(lods.len() as u32).unwrap();
    for lod in lods {
        mesh.extend_from_slice(lod);
    }
    mesh.extend_from_slice(&EXPORT_TAIL);
    encode_container(&names, &[(2, mesh), (3, vec![0xAB; 5])], b"")
}

/// One triangle weighted fully to `bone`, lifted to height `z`.
fn triangle(material_id: u32, bone: u16, z: f32) -> SectionGeometry {
    SectionGeometry {
        material_id,
        positions: vec![[0.0, 0.0, z], [0.5, 0.0, z], [0.0, 0.5, z]],
        normals: vec![[0.0, 0.0, 1.0]; 3],
        tangents: vec![[1.0, 0.0, 0.0, 1.0]; 3],
        uvs: vec![vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]],
        joints: Some(vec![[bone, 0, 0, 0]; 3]),
        weights: Some(vec![[1.0, 0.0, 0.0, 0.0]; 3]),
        indices: vec![0, 1, 2],
        ..SectionGeometry::default()
    }
}

fn unskinned(geometry: SectionGeometry) -> SectionGeometry {
    SectionGeometry { joints: None, weights: None, ..geometry }
}

fn skeletal(container: &UexpContainer) -> &SkeletalMesh {
    match container.mesh().unwrap() {
        MeshAsset::Skeletal(mesh) => mesh,
        MeshAsset::Static(_) => panic!("expected a skeletal mesh"),
    }
}

/// Section face counts add up to the index buffer and vertex counts agree.
fn assert_lod_consistent(lod: &SkeletalLod) {
    let faces: u32 = lod.sections.iter().map(|s| s.face_count).sum();
    assert_eq!(faces * 3, lod.indices.index_count());
    let vertices: u32 = lod.sections.iter().map(|s| s.vertex_count).sum();
    assert_eq!(vertices, lod.vertex_count());
    assert_eq!(lod.weights.vertex_count(), lod.vertex_count());
    assert_eq!(lod.uv_count, lod.attributes.uv_count);
    assert_eq!(lod.adjacency.index_count(), faces * 9);
    if let Some(kdi) = &lod.kdi {
        assert_eq!(kdi.buffer.buffer.count(), lod.kdi_entry_count());
        assert_eq!(kdi.vertex_buffer.buffer.count(), lod.vertex_count());
    }
}

// ==================== Round trips ====================

#[test]
fn test_skeletal_container_round_trip_on_disk() {
    let dir = tempdir().unwrap();
    let fixture = hero(&[skeletal_lod_bytes(2, true), skeletal_lod_bytes(0, false)]);
    let path = write_container(dir.path(), "SK_Hero", &fixture);

    let mut container = UexpContainer::load(&path).unwrap();
    assert_eq!(container.mesh_kind(), Some(MeshKind::Skeletal));
    let mesh = skeletal(&container);
    assert_eq!(mesh.lods.len(), 2);
    assert_eq!(mesh.materials[1].slot_name, "Hair");
    assert_eq!(mesh.skeleton.find_bone_id("arm"), 2);
    assert!(matches!(
        &container.payloads()[1],
        ExportPayload::Mesh { tail, .. } if tail.as_slice() == EXPORT_TAIL
    ));

    let out = dir.path().join("out");
    container.save(out.join("SK_Hero.uexp")).unwrap();
    assert_eq!(container.state(), ContainerState::Saved);
    assert_eq!(fs::read(out.join("SK_Hero.uexp")).unwrap(), fixture.1);
    assert_eq!(fs::read(out.join("SK_Hero.uasset")).unwrap(), fixture.0);
}

#[test]
fn test_rebuild_lod_survives_save_and_reload() {
    let dir = tempdir().unwrap();
    let path = write_container(dir.path(), "SK_Hero", &hero(&[skeletal_lod_bytes(1, true)]));

    let mut container = UexpContainer::load(&path).unwrap();
    let sections = vec![triangle(0, 1, 0.25), triangle(1, 2, 0.5)];
    container.mesh_mut().unwrap().rebuild_lod(0, &sections).unwrap();
    let out = dir.path().join("rebuilt/SK_Hero.uexp");
    container.save(&out).unwrap();

    let reloaded = UexpContainer::load(&out).unwrap();
    let lod = &skeletal(&reloaded).lods[0];
    assert_lod_consistent(lod);
    assert_eq!(lod.sections[1].vertex_group, vec![2]);
    assert_eq!(lod.colors.as_ref().unwrap().buffer.count(), 6);

    let interchange = reloaded.mesh().unwrap().lod_interchange(0).unwrap();
    assert_eq!(interchange.material_ids(), vec![0, 1]);
    for (got, want) in interchange.sections.iter().zip(&sections) {
        assert_eq!(got.positions, want.positions);
        assert_eq!(got.indices, want.indices);
        assert_eq!(got.joints, want.joints);
        assert_eq!(got.weights, want.weights);
        assert_eq!(got.uvs, want.uvs);
    }
}

#[test]
fn test_static_container_rebuild_and_reload() {
    let dir = tempdir().unwrap();
    let path = write_container(dir.path(), "SM_Rock", &rock(&[static_lod_bytes(0)]));

    let mut container = UexpContainer::load(&path).unwrap();
    assert_eq!(container.mesh_kind(), Some(MeshKind::Static));
    let sections = vec![unskinned(triangle(1, 0, 0.25)), unskinned(triangle(0, 0, 0.5))];
    container.mesh_mut().unwrap().rebuild_lod(0, &sections).unwrap();
    let (uasset, uexp) = container.to_bytes().unwrap();

    let reloaded = UexpContainer::from_bytes(&uasset, &uexp, "SM_Rock", &ContainerOptions::default()).unwrap();
    let MeshAsset::Static(mesh) = reloaded.mesh().unwrap() else { panic!("expected a static mesh") };
    let lod = &mesh.lods[0];
    assert_eq!(lod.vertex_count(), 6);
    assert_eq!(lod.face_count(), 2);
    assert_eq!(lod.sections[1].flags, [3; 12]);
    assert_eq!(lod.trailer, [7; 48]);
    assert_eq!(lod.depth_indices.indices(), lod.indices.indices());

    let interchange = reloaded.mesh().unwrap().lod_interchange(0).unwrap();
    assert_eq!(interchange.sections[1].positions, sections[1].positions);
    assert_eq!(interchange.sections[1].indices, vec![0, 1, 2]);
    assert!(interchange.sections[0].joints.is_none());
}

// ==================== Scenarios ====================

#[test]
fn test_opaque_only_container() {
    let names = ["None", USER_DATA, "SQEX_BonamikAssetUserData"];
    let fixture = encode_container(&names, &[(1, vec![5; 10]), (2, vec![6; 3])], b"");
    let dir = tempdir().unwrap();
    let path = write_container(dir.path(), "SK_Anything", &fixture);

    let mut container = UexpContainer::load(&path).unwrap();
    assert!(container.uasset().exports.iter().all(|e| e.kind == ExportKind::Opaque));
    assert!(container.payloads().iter().all(|p| matches!(p, ExportPayload::Opaque(_))));
    assert_eq!(container.to_bytes().unwrap(), fixture);
}

#[test]
fn test_static_unsupported_feature_is_fatal() {
    let (uasset, uexp) = rock(&[static_lod_bytes(1)]);
    let err = UexpContainer::from_bytes(&uasset, &uexp, "SM_Rock", &ContainerOptions::default()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFeature { feature: "adjacency or reversed index buffer", .. }));
}

#[test]
fn test_import_grows_sections_by_cloning() {
    init_tracing();
    let (uasset, uexp) = hero(&[skeletal_lod_bytes(1, false)]);
    let mut target = UexpContainer::from_bytes(&uasset, &uexp, "SK_Hero", &ContainerOptions::default()).unwrap();
    let (uasset, uexp) = donor(&[skeletal_lod_bytes(0, false)]);
    let mut donor = UexpContainer::from_bytes(&uasset, &uexp, "SK_Donor", &ContainerOptions::default()).unwrap();
    donor
        .mesh_mut()
        .unwrap()
        .rebuild_lod(0, &[triangle(0, 0, 0.25), triangle(0, 1, 0.5), triangle(0, 1, 0.75)])
        .unwrap();

    target.import_lods(&donor, ImportOptions::new().with_keep_kdi(true)).unwrap();
    let lod = &skeletal(&target).lods[0];
    assert_eq!(lod.sections.len(), 3);
    let donor_lod = &skeletal(&donor).lods[0];
    for (section, donor_section) in lod.sections.iter().zip(&donor_lod.sections) {
        // target metadata, donor ranges
        assert_eq!(section.flags, [7, 7]);
        assert_eq!(section.unknown, [9; 8]);
        assert_eq!(section.kdi_entry_count(), 1);
        assert_eq!(section.first_vertex_id, donor_section.first_vertex_id);
        assert_eq!(section.first_index_id, donor_section.first_index_id);
        assert_eq!(section.face_count, donor_section.face_count);
        assert_eq!(section.material_id, 1);
    }
    assert_eq!(lod.sections[0].vertex_group, vec![0]);
    assert_eq!(lod.sections[2].vertex_group, vec![2]);
    assert_lod_consistent(lod);
    assert_eq!(lod.kdi.as_ref().unwrap().buffer.buffer.count(), 3);
}

#[test]
fn test_skin_weight_extra_bone_flag() {
    let weights = SkinWeights {
        joints: (0..10u8).map(|i| [i, 0, 0, 0]).collect(),
        weights: vec![[1.0, 0.0, 0.0, 0.0]; 10],
        ..SkinWeights::default()
    };
    let mut buffer = SkinWeightVertexBuffer { extra_bone: false, buffer: empty(8) };
    buffer.set_weights(&weights).unwrap();
    let mut out = Vec::new();
    buffer.write(&mut out).unwrap();
    let decoded = SkinWeightVertexBuffer::read(&mut Cursor::new(out.as_slice())).unwrap();
    assert_eq!(decoded.buffer.stride(), 8);
    let back = decoded.weights();
    assert_eq!(back.joints2, None);
    assert_eq!(back.weights2, None);
    assert_eq!(back, weights);

    let extra = SkinWeights {
        joints2: Some(vec![[1, 2, 0, 0]; 10]),
        weights2: Some(vec![[0.0; 4]; 10]),
        ..weights
    };
    buffer.set_weights(&extra).unwrap();
    let mut out = Vec::new();
    buffer.write(&mut out).unwrap();
    let decoded = SkinWeightVertexBuffer::read(&mut Cursor::new(out.as_slice())).unwrap();
    assert!(decoded.extra_bone);
    assert_eq!(decoded.buffer.stride(), 16);
    assert_eq!(decoded.weights(), extra);
}

// ==================== Import ====================

#[test]
fn test_import_remaps_and_saves() {
    init_tracing();
    let dir = tempdir().unwrap();
    let target_path = write_container(dir.path(), "SK_Hero", &hero(&[skeletal_lod_bytes(2, true), skeletal_lod_bytes(0, true)]));
    let (uasset, uexp) = donor(&[skeletal_lod_bytes(0, false)]);
    let mut donor = UexpContainer::from_bytes(&uasset, &uexp, "SK_Donor", &ContainerOptions::default()).unwrap();
    donor.mesh_mut().unwrap().rebuild_lod(0, &[triangle(0, 1, 0.25)]).unwrap();

    let mut target = UexpContainer::load(&target_path).unwrap();
    target.embed_author("modder");
    target.import_lods(&donor, ImportOptions::default()).unwrap();
    let out = dir.path().join("out/SK_Hero.uasset");
    target.save(&out).unwrap();

    let reloaded = UexpContainer::load(&out).unwrap();
    assert_eq!(reloaded.author(), "modder");
    let mesh = skeletal(&reloaded);
    assert_eq!(mesh.lods.len(), 2);
    let lod = &mesh.lods[0];
    assert_lod_consistent(lod);
    assert!(lod.kdi.is_none());
    assert_eq!(lod.kdi_entry_count(), 0);
    // donor colors are missing, so the target's are kept and padded
    assert_eq!(lod.colors.as_ref().unwrap().buffer.data(), &[0xFF; 12]);
    assert_eq!(lod.sections[0].material_id, 1);
    assert_eq!(lod.sections[0].vertex_group, vec![2]);
    // the second LOD has no donor counterpart
    assert_eq!(mesh.lods[1].vertex_count(), 0);

    let joints = reloaded.mesh().unwrap().lod_interchange(0).unwrap().sections[0].joints.clone().unwrap();
    assert_eq!(joints, vec![[2, 0, 0, 0]; 3]);

    // the mesh export ends where the author trailer starts
    let uexp_len = fs::read(dir.path().join("out/SK_Hero.uexp")).unwrap().len();
    let export = &reloaded.uasset().exports[1];
    assert_eq!(
        (export.offset + export.size) as usize,
        reloaded.uasset().encoded_len() + uexp_len - "modder".len() - PACKAGE_MAGIC.len()
    );
}

#[test]
fn test_import_rejects_mismatched_kinds() {
    let (uasset, uexp) = rock(&[static_lod_bytes(0)]);
    let mut target = UexpContainer::from_bytes(&uasset, &uexp, "SM_Rock", &ContainerOptions::default()).unwrap();
    let (uasset, uexp) = donor(&[skeletal_lod_bytes(0, false)]);
    let donor = UexpContainer::from_bytes(&uasset, &uexp, "SK_Donor", &ContainerOptions::default()).unwrap();
    assert!(matches!(
        target.import_lods(&donor, ImportOptions::default()),
        Err(Error::MeshKindMismatch { .. })
    ));
}

#[test]
fn test_remove_lods_and_dump() {
    let dir = tempdir().unwrap();
    let path = write_container(dir.path(), "SK_Hero", &hero(&[skeletal_lod_bytes(1, true), skeletal_lod_bytes(0, false)]));
    let mut container = UexpContainer::load(&path).unwrap();
    container.remove_lods().unwrap();
    container.remove_kdi().unwrap();
    assert_eq!(container.mesh().unwrap().lod_count(), 1);

    let written = container.dump_buffers(dir.path().join("dump")).unwrap();
    assert_eq!(written.len(), 5);
    assert!(dir.path().join("dump/LOD0_ColorVB.bin").exists());
    assert!(!dir.path().join("dump/LOD0_KDI_buffer.bin").exists());
}

#[test]
fn test_unknown_export_is_rejected() {
    let names = ["None", "SkeletalMesh", "SomethingElse"];
    let (uasset, uexp) = encode_container(&names, &[(2, vec![0; 4])], b"");
    let err = UexpContainer::from_bytes(&uasset, &uexp, "SK_Hero", &ContainerOptions::default()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedAsset { name } if name == "SomethingElse"));

    let options = ContainerOptions::new().with_known_export("SomethingElse");
    assert!(UexpContainer::from_bytes(&uasset, &uexp, "SK_Hero", &options).is_ok());
}

// ==================== Malformed input ====================

/// A skeletal LOD whose index buffer claims `u32::MAX` two-byte elements.
fn oversized_lod() -> Vec<u8> {
    let mut lod = skeletal_lod_bytes(0, false);
    // marker, section count and one 44-byte section, then width and stride
    let count_at = 2 + 4 + 44 + 1 + 4;
    assert_eq!(&lod[count_at - 5..count_at], &[2, 2, 0, 0, 0]);
    lod[count_at..count_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    lod
}

#[test]
fn test_oversized_buffer_is_a_load_error() {
    init_tracing();
    let (uasset, uexp) = hero(&[oversized_lod()]);
    let err = UexpContainer::from_bytes(&uasset, &uexp, "SK_Hero", &ContainerOptions::default()).unwrap_err();
    assert!(matches!(err, Error::FormatMismatch { what: "length within stream", .. }), "{err}");

    // the rest of a batch still runs
    let dir = tempdir().unwrap();
    write_container(dir.path(), "SK_Hero", &(uasset, uexp));
    fs::create_dir_all(dir.path().join("props")).unwrap();
    write_container(&dir.path().join("props"), "SM_Rock", &rock(&[static_lod_bytes(0)]));
    let result = batch_verify(&find_uexp_files(dir.path()), &ContainerOptions::default(), |_, _, _| {});
    assert_eq!(result.success_count, 1);
    assert_eq!(result.fail_count, 1);
    assert!(result.results.iter().any(|r| r.starts_with("Failed") && r.contains("length within stream")));
}

#[test]
fn test_shifted_export_offset_is_a_load_error() {
    let (uasset, uexp) = hero(&[skeletal_lod_bytes(0, false)]);
    let options = ContainerOptions::default();
    let mut metadata = Uasset::from_bytes(&uasset, "SK_Hero", &options.known_exports).unwrap();
    metadata.exports[1].offset += 1;
    let shifted = metadata.to_bytes().unwrap();

    let err = UexpContainer::from_bytes(&shifted, &uexp, "SK_Hero", &options).unwrap_err();
    match err {
        Error::OffsetMismatch { export, expected, actual } => {
            assert_eq!(export, "SK_Hero");
            assert_eq!(expected, actual + 1);
            assert_eq!(actual, uasset.len() as u64 + 4);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_bad_trailer_signature_is_a_load_error() {
    let dir = tempdir().unwrap();
    let (uasset, mut uexp) = hero(&[skeletal_lod_bytes(1, true)]);
    let last = uexp.len() - 1;
    uexp[last] ^= 0xFF;
    let path = write_container(dir.path(), "SK_Hero", &(uasset, uexp));

    let err = UexpContainer::load(&path).unwrap_err();
    assert!(matches!(err, Error::FormatMismatch { what: "uexp signature", .. }), "{err}");
}

// ==================== Batch ====================

#[test]
fn test_batch_verify_directory() {
    let dir = tempdir().unwrap();
    write_container(dir.path(), "SK_Hero", &hero(&[skeletal_lod_bytes(1, true)]));
    fs::create_dir_all(dir.path().join("props")).unwrap();
    write_container(&dir.path().join("props"), "SM_Rock", &rock(&[static_lod_bytes(0)]));

    let files = find_uexp_files(dir.path());
    assert_eq!(files.len(), 2);
    let result = batch_verify(&files, &ContainerOptions::default(), |_, _, _| {});
    assert_eq!(result.fail_count, 0, "{:?}", result.results);
    assert_eq!(result.success_count, 2);
}
