//! Integration tests for reading the sample files under `data/`.

use emcore::core::{ArrayDim, Image, ImageLocation, Table};
use emcore::formats::{ImageFile, TableFile};
use emcore::io::FileMode;
use emcore::{Error, Type};

const DATA_STAR_PATH: &str = "data/star/classify3d_small_it038_data.star";
const SAMPLING_STAR_PATH: &str = "data/star/classify3d_small_it038_sampling.star";
const IMAGES_XMD_PATH: &str = "data/star/images.xmd";
const GAUSS_MRC_PATH: &str = "data/mrc/gauss2d.mrc";
const STACK_MRC_PATH: &str = "data/mrc/stack2d.mrcs";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const IMAGES_COLUMNS: [&str; 17] = [
    "rlnVoltage",
    "rlnDefocusU",
    "rlnSphericalAberration",
    "rlnAmplitudeContrast",
    "rlnImageName",
    "rlnNormCorrection",
    "rlnMicrographName",
    "rlnGroupNumber",
    "rlnOriginX",
    "rlnOriginY",
    "rlnAngleRot",
    "rlnAngleTilt",
    "rlnAnglePsi",
    "rlnClassNumber",
    "rlnLogLikeliContribution",
    "rlnNrOfSignificantSamples",
    "rlnMaxValueProbDistribution",
];

#[test]
fn test_read_star_images() {
    init_tracing();
    assert!(TableFile::has_impl("star"));

    let mut t = Table::new();
    t.read_block(DATA_STAR_PATH, "images")
        .expect("Failed to read images block");

    assert_eq!(t.len(), 79);
    assert_eq!(t.column_names(), IMAGES_COLUMNS);
    let ids: Vec<usize> = t.columns().iter().map(|c| c.id()).collect();
    assert_eq!(ids, (1..=17).collect::<Vec<_>>());

    assert_eq!(t.column("rlnGroupNumber").unwrap().ty(), Type::INT32);
    assert_eq!(t.column("rlnDefocusU").unwrap().ty(), Type::DOUBLE);
    assert_eq!(t.column("rlnImageName").unwrap().ty(), Type::STRING);

    let first = &t[0];
    assert_eq!(first["rlnGroupNumber"], 1);
    assert_eq!(first["rlnDefocusU"], 15060.5);
    assert_eq!(first["rlnImageName"], "000080@cluster/wind2/win_05677.dat");

    let gold_defocus = [
        15060.5, 16009.5, 18642.2, 24642.4, 24772.8, 25580.8, 26833.9, 27164.9, 30135.1, 33744.2,
        35465.5, 13923.4, 17895.1, 19206.2, 24165.1, 24650.4, 25866.7, 26527.1, 27915.1, 29939.5,
    ];
    for (i, (row, gold)) in t.iter().zip(gold_defocus).enumerate() {
        assert_eq!(row["rlnDefocusU"], gold, "row {}", i);
        assert_eq!(row["rlnGroupNumber"], i as i32 + 1);
    }
    assert_eq!(t[20]["rlnImageName"], "000080@cluster/wind2/win_04165.dat");
}

#[test]
fn test_read_first_block_by_default() {
    let mut by_default = Table::new();
    by_default.read(DATA_STAR_PATH).expect("Failed to read first block");
    let mut by_name = Table::new();
    by_name.read_block(DATA_STAR_PATH, "images").unwrap();
    assert_eq!(by_default, by_name);
}

#[test]
fn test_predeclared_columns_are_replaced() {
    let mut t = Table::with_columns([
        emcore::core::Column::with_id(1, "col1", Type::FLOAT),
        emcore::core::Column::with_id(2, "col2", Type::INT16),
        emcore::core::Column::with_id(3, "col3", Type::STRING),
    ])
    .unwrap();
    assert_eq!(t.column_count(), 3);
    assert!(t.is_empty());

    t.read_block(DATA_STAR_PATH, "images").unwrap();
    assert_eq!(t.column_count(), 17);
    assert!(t.column("col1").is_err());
}

#[test]
fn test_read_star_multiple_tables() {
    init_tracing();
    let mut tio = TableFile::new();
    tio.open(SAMPLING_STAR_PATH, FileMode::ReadOnly)
        .expect("Failed to open sampling star");
    assert_eq!(
        tio.table_names().unwrap(),
        vec!["sampling_general", "sampling_directions"]
    );

    let mut general = Table::new();
    tio.read("sampling_general", &mut general).unwrap();
    assert_eq!(general.len(), 1);
    assert_eq!(general.column_count(), 11);
    assert_eq!(general[0]["rlnSymmetryGroup"], "C1");
    assert_eq!(general[0]["rlnTiltAngleLimit"], -91.0);
    assert_eq!(general[0]["rlnHealpixOrder"], 1);

    let mut directions = Table::new();
    tio.read("sampling_directions", &mut directions).unwrap();
    assert_eq!(directions.len(), 48);
    assert_eq!(directions.column_names(), vec!["rlnAngleRot", "rlnAngleTilt"]);
    assert_eq!(directions[47]["rlnAngleRot"], 352.5);

    assert!(matches!(
        tio.read("sampling_missing", &mut directions),
        Err(Error::UnknownTable(_))
    ));
    assert_eq!(directions.len(), 48);
    tio.close().unwrap();
}

#[test]
fn test_read_xmd() {
    assert!(TableFile::has_impl("xmd"));
    let mut tio = TableFile::new();
    tio.open(IMAGES_XMD_PATH, FileMode::ReadOnly)
        .expect("Failed to open xmd");
    assert_eq!(tio.table_names().unwrap(), vec!["noname"]);

    let mut t = Table::new();
    tio.read("noname", &mut t).unwrap();
    assert_eq!(t.len(), 12);
    assert_eq!(
        t.column_names(),
        vec!["image", "enabled", "shiftX", "shiftY", "anglePsi", "micrograph"]
    );
    assert_eq!(t.column("enabled").unwrap().ty(), Type::INT32);
    assert_eq!(t[0]["micrograph"], "Micrographs/BPV 1386.mrc");
    assert_eq!(t[3]["anglePsi"], 90.0);

    let loc: ImageLocation = t[1]["image"].to_string().parse().unwrap();
    assert_eq!(loc.index, 2);
    assert_eq!(loc.path, std::path::PathBuf::from("Images/img.stk"));
}

#[test]
fn test_read_mrc_location() {
    init_tracing();
    let mut img = Image::new();
    img.read(&ImageLocation::new(GAUSS_MRC_PATH, ImageLocation::FIRST))
        .expect("Failed to read gauss2d.mrc");

    let dim = img.dim();
    assert_eq!(dim, ArrayDim::new(16, 16, 1, 1));
    assert_eq!(img.ty(), Type::FLOAT);
    assert_eq!(img.byte_size(), dim.size() * img.ty().size());

    assert_eq!(img.header()["format"], "mrc");
    assert_eq!(img.header()["pixel_size"], 1.5f32);

    let view = img.view::<f32>().unwrap();
    let peak = view[(7, 7)];
    assert!((peak - 0.972_604_4).abs() < 1e-6);
    assert!(view[(0, 0)] < 0.01);
}

#[test]
fn test_read_mrc_stack() {
    let mut f = ImageFile::new();
    f.open(STACK_MRC_PATH, FileMode::ReadOnly)
        .expect("Failed to open stack2d.mrcs");
    assert_eq!(f.format_name(), Some("mrc"));
    assert_eq!(f.dim(), ArrayDim::new(8, 8, 1, 3));
    assert_eq!(f.ty(), Type::INT16);

    let mut img = Image::new();
    for k in 1..=3usize {
        f.read(k, &mut img).unwrap();
        assert_eq!(img.dim(), ArrayDim::new(8, 8, 1, 1));
        let data = img.data::<i16>().unwrap();
        assert_eq!(data[0], (k as i16 - 1) * 100);
        assert_eq!(data[63], (k as i16 - 1) * 100 + 63);
    }

    // ALL reads the first item.
    f.read(ImageLocation::ALL, &mut img).unwrap();
    assert_eq!(img.data::<i16>().unwrap()[0], 0);

    let before = img.clone();
    assert!(matches!(
        f.read(4, &mut img),
        Err(Error::IndexOutOfRange { index: 4, count: 3 })
    ));
    assert_eq!(img, before);
}

#[test]
fn test_truncated_mrc_is_corrupt() {
    let bytes = std::fs::read(GAUSS_MRC_PATH).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.mrc");
    std::fs::write(&path, &bytes[..bytes.len() - 100]).unwrap();

    let mut img = Image::new();
    let err = img.read(&path.as_path().into()).unwrap_err();
    assert!(matches!(err, Error::CorruptFile { .. }));
    assert!(img.is_empty());
}
