use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use approx::assert_relative_eq;
use gridmap::output::{write_descriptor, write_grid};
use gridmap::{
    convert, load_scans, read_pcd, write_descriptor_file, write_grid_file, write_raster_file,
    ConvertError, GridModel, GridParameters, HeightRaster, MapDescriptor, PcdDirectory, Point3D,
    ScanId,
};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gridmap-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn ascii_pcd(points: &[(f32, f32, f32, f32)]) -> String {
    let mut text = format!(
        "# .PCD v0.7\nVERSION 0.7\nFIELDS x y z intensity\nSIZE 4 4 4 4\nTYPE F F F F\n\
         COUNT 1 1 1 1\nWIDTH {n}\nHEIGHT 1\nVIEWPOINT 0 0 0 1 0 0 0\nPOINTS {n}\nDATA ascii\n",
        n = points.len()
    );
    for (x, y, z, i) in points {
        text.push_str(&format!("{x} {y} {z} {i}\n"));
    }
    text
}

#[test]
fn unit_grid_scenario() {
    // (2, 2) stretches the extent so both (0, 0) and (1, 1) fall inside a
    // 2x2 grid; the point itself sits on the far edge and is dropped.
    let pcd = ascii_pcd(&[(0.0, 0.0, 0.0, 5.0), (1.0, 1.0, 0.0, 5.0), (2.0, 2.0, 0.0, 5.0)]);
    let points = read_pcd(Cursor::new(pcd)).unwrap();
    let scans = [gridmap::Scan {
        id: ScanId::from(1),
        points,
    }];
    let params = GridParameters::new(1.0, -1.0, 1.0).unwrap();

    let conversion = convert(&scans, &params).unwrap();

    assert_eq!(conversion.grid.width(), 2);
    assert_eq!(conversion.grid.height(), 2);
    assert_eq!(conversion.grid.get(0, 0), Some(GridModel::OCCUPIED));
    assert_eq!(conversion.grid.get(1, 1), Some(GridModel::OCCUPIED));
    assert_eq!(conversion.grid.get(1, 0), Some(GridModel::UNKNOWN));
    assert_eq!(conversion.grid.get(0, 1), Some(GridModel::UNKNOWN));
    assert_eq!(conversion.occupancy_stats.out_of_extent, 1);

    let mut text = Vec::new();
    write_grid(&mut text, &conversion.grid, &conversion.alignment).unwrap();
    let text = String::from_utf8(text).unwrap();
    let mut lines = text.lines();

    assert_eq!(lines.next(), Some("15 1 2 2 1 0 0"));
    assert_eq!(lines.next(), Some("0 254 "));
    assert_eq!(lines.next(), Some("254 0 "));
    assert_eq!(lines.next(), None);
}

#[test]
fn five_centimetre_grid_over_one_metre() {
    let points: Vec<Point3D> = (0..=100)
        .map(|i| {
            let t = i as f32 / 100.0;
            Point3D::new(t, 1.0 - t, 0.0, 0.0)
        })
        .collect();
    let scans = [gridmap::Scan {
        id: ScanId::from(1),
        points,
    }];

    let conversion = convert(&scans, &GridParameters::default()).unwrap();

    assert_eq!(conversion.grid.width(), 20);
    assert_eq!(conversion.grid.height(), 20);
    assert_relative_eq!(conversion.alignment.resolution, 0.05);
}

#[test]
fn empty_cloud_is_rejected() {
    let pcd = ascii_pcd(&[]);
    let points = read_pcd(Cursor::new(pcd)).unwrap();
    assert!(points.is_empty());

    let scans = [gridmap::Scan {
        id: ScanId::from(1),
        points,
    }];
    let err = convert(&scans, &GridParameters::default()).unwrap_err();

    assert!(matches!(err, ConvertError::DegenerateExtent { .. }));
}

#[test]
fn directory_of_scans_to_artifacts() {
    let dir = scratch_dir("artifacts");
    fs::write(
        dir.join("1.pcd"),
        ascii_pcd(&[(-1.0, -1.0, 0.2, 1.0), (0.5, 0.25, 0.4, 1.0)]),
    )
    .unwrap();
    fs::write(
        dir.join("3.pcd"),
        ascii_pcd(&[(2.0, 1.0, 0.1, 1.0), (0.0, 0.0, 5.0, 1.0)]),
    )
    .unwrap();
    fs::write(dir.join("4.pcd"), "not a point cloud\n").unwrap();

    let source = PcdDirectory::new(&dir);
    let ids: Vec<ScanId> = (1..=4).map(ScanId::from).collect();
    let scans = load_scans(&source, &ids);

    // 2.pcd is missing and 4.pcd is malformed.
    assert_eq!(scans.len(), 2);

    let params = GridParameters::new(0.5, -0.5, 0.5).unwrap();
    let conversion = convert(&scans, &params).unwrap();
    assert_eq!(conversion.grid.width(), 6);
    assert_eq!(conversion.grid.height(), 4);

    let grid_path = dir.join("ProbMap.txt");
    let image_path = dir.join("PM.pgm");
    let yaml_path = dir.join("PM.yaml");

    write_grid_file(&grid_path, &conversion.grid, &conversion.alignment).unwrap();
    let descriptor = MapDescriptor::new("PM.pgm", &conversion.alignment);
    write_descriptor_file(&yaml_path, &descriptor).unwrap();
    write_raster_file(&image_path, &conversion.raster).unwrap();

    let grid_text = fs::read_to_string(&grid_path).unwrap();
    let header: Vec<&str> = grid_text.lines().next().unwrap().split(' ').collect();
    assert_eq!(header, ["15", "0.5", "4", "6", "0.5", "-1", "-1"]);
    assert_eq!(grid_text.lines().count(), 1 + 4);
    assert!(grid_text
        .lines()
        .skip(1)
        .all(|row| row.split_whitespace().count() == 6));

    let pgm = fs::read(&image_path).unwrap();
    assert!(pgm.starts_with(b"P5"));
    assert_eq!(&pgm[pgm.len() - 24..], conversion.raster.as_raw());
    assert!(conversion
        .raster
        .as_raw()
        .iter()
        .any(|&p| p != HeightRaster::BACKGROUND));

    let yaml: MapDescriptor = serde_yaml_roundtrip(&yaml_path);
    assert_eq!(yaml.image, "PM.pgm");
    assert_eq!(yaml.origin, [-1.0, -1.0, 0.0]);
    assert_relative_eq!(yaml.resolution, 0.5);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn png_raster_by_extension() {
    let dir = scratch_dir("png");
    let scans = [gridmap::Scan {
        id: ScanId::from(1),
        points: vec![
            Point3D::new(0.0, 0.0, 0.1, 0.0),
            Point3D::new(3.0, 2.0, 0.3, 0.0),
        ],
    }];
    let conversion = convert(&scans, &GridParameters::new(1.0, 0.0, 0.5).unwrap()).unwrap();

    let path = dir.join("height.png");
    write_raster_file(&path, &conversion.raster).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[1..4], b"PNG");

    fs::remove_dir_all(&dir).unwrap();
}

fn serde_yaml_roundtrip(path: &std::path::Path) -> MapDescriptor {
    let text = fs::read_to_string(path).unwrap();
    let mut again = Vec::new();
    let parsed: MapDescriptor = serde_yaml::from_str(&text).unwrap();
    write_descriptor(&mut again, &parsed).unwrap();
    assert_eq!(String::from_utf8(again).unwrap(), text);
    parsed
}
