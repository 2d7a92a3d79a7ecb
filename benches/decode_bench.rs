use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec3;
use std::io::Cursor;
use zonekit::geometry::{extract_mesh, SpatialClassifier};
use zonekit::pfs::{crc::filename_crc, Archive, PackOptions, PfsWriter};
use zonekit::wld::{Wld, WldBuilder};

fn pack(files: usize, size: usize) -> Vec<u8> {
    let data: Vec<u8> = (0..size).map(|i| (i * 31 % 251) as u8).collect();
    let mut writer = PfsWriter::new(Cursor::new(Vec::new()), PackOptions::default());
    for i in 0..files {
        writer.add_file(&format!("file_{i}.bin"), &data).unwrap();
    }
    writer.finalize().unwrap().into_inner()
}

/// Material lists plus one BSP tree of `depth` levels along x.
fn synthetic_wld(lists: usize, depth: u32) -> Vec<u8> {
    let mut b = WldBuilder::new(false);
    for i in 0..lists {
        let mut body = Vec::new();
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&4u32.to_le_bytes());
        for r in 0..4i32 {
            body.extend_from_slice(&(r + i as i32).to_le_bytes());
        }
        b.push(0x31, &format!("LIST_{i}"), body);
    }

    // Node k splits at x = k; left goes deeper, right is leaf region k+1.
    let mut tree = Vec::new();
    tree.extend_from_slice(&(depth * 2 + 1).to_le_bytes());
    for k in 0..depth {
        for v in [1.0f32, 0.0, 0.0, k as f32] {
            tree.extend_from_slice(&v.to_le_bytes());
        }
        for v in [0u32, 2 * k + 3, 2 * k + 2] {
            tree.extend_from_slice(&v.to_le_bytes());
        }
        for v in [0.0f32, 0.0, 0.0, 0.0] {
            tree.extend_from_slice(&v.to_le_bytes());
        }
        for v in [k + 1, 0, 0] {
            tree.extend_from_slice(&v.to_le_bytes());
        }
    }
    for v in [0.0f32, 0.0, 0.0, 0.0] {
        tree.extend_from_slice(&v.to_le_bytes());
    }
    for v in [depth + 1, 0, 0] {
        tree.extend_from_slice(&v.to_le_bytes());
    }
    b.push(0x21, "", tree);
    b.finish()
}

fn bench_archive(c: &mut Criterion) {
    let bytes = pack(16, 64 * 1024);
    c.bench_function("pfs_load_16x64k", |b| b.iter(|| Archive::from_bytes(black_box(&bytes)).unwrap()));
    c.bench_function("filename_crc", |b| b.iter(|| filename_crc(black_box("gfaydark_chr.wld"))));
}

fn bench_wld(c: &mut Criterion) {
    let bytes = synthetic_wld(10_000, 200);
    c.bench_function("wld_parse_10k_fragments", |b| b.iter(|| Wld::parse(black_box(&bytes)).unwrap()));

    let wld = Wld::parse(&bytes).unwrap();
    c.bench_function("extract_mesh_empty", |b| b.iter(|| extract_mesh(black_box(&wld))));

    let classifier = SpatialClassifier::build(&wld);
    c.bench_function("bsp_leaf_at_depth_200", |b| {
        b.iter(|| classifier.leaf_at(black_box(Vec3::new(150.5, 0.0, 0.0))))
    });
}

criterion_group!(benches, bench_archive, bench_wld);
criterion_main!(benches);
