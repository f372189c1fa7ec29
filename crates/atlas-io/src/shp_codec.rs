//! ESRI shapefile codec
//!
//! A shapefile is really three files: `.shp` geometry, `.shx` index and a
//! `.dbf` attribute table. The codec is addressed through the `.shp` path
//! and reads/writes all three.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use shapefile::dbase::{FieldName, FieldType, FieldValue, Record, TableWriterBuilder};
use shapefile::{Shape, ShapeReader, ShapeType};

use crate::codec::{ensure_exists, IoError, IoResult, PayloadCodec};
use crate::schema::{DataColumn, DataTable};

/// Width of numeric dBASE fields written for new float columns
const NUMERIC_WIDTH: u8 = 20;
const NUMERIC_DECIMALS: u8 = 10;
/// dBASE character fields cannot exceed 254 bytes
const MAX_CHARACTER_WIDTH: usize = 254;
/// Size of the `.dbf` file header and of each field descriptor after it
const DBF_BLOCK: usize = 32;
/// Offset of the decimal count inside a field descriptor
const DBF_DECIMALS_OFFSET: usize = 17;

/// Layout of one dBASE field as declared in a `.dbf` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field_type: FieldType,
    pub length: u8,
    pub decimals: u8,
}

impl FieldSpec {
    pub fn new(field_type: FieldType, length: u8, decimals: u8) -> Self {
        Self {
            field_type,
            length,
            decimals,
        }
    }

    /// True when every value survives being written with this width and
    /// decimal count
    fn holds(&self, values: &[f64]) -> bool {
        let places = self.decimals as usize;
        values.iter().filter(|x| !x.is_nan()).all(|&x| {
            let (text, exact) = match self.field_type {
                FieldType::Float => {
                    let text = format!("{:.*}", places, x as f32);
                    let exact = text.parse::<f32>().map_or(false, |y| f64::from(y) == x);
                    (text, exact)
                }
                _ => {
                    let text = format!("{:.*}", places, x);
                    let exact = text.parse::<f64>().map_or(false, |y| y == x);
                    (text, exact)
                }
            };
            exact && text.len() <= self.length as usize
        })
    }
}

/// Geometry column plus attribute columns, one row per feature.
///
/// Tables read from disk remember the `.dbf` field layout, so an unmodified
/// table is written back with the same field widths. Equality compares the
/// features only.
#[derive(Default)]
pub struct VectorTable {
    pub geometry: Vec<Shape>,
    pub attributes: DataTable,
    fields: BTreeMap<String, FieldSpec>,
}

impl VectorTable {
    /// Pair geometries with attributes. A table without columns is allowed
    /// for any number of shapes.
    pub fn new(geometry: Vec<Shape>, attributes: DataTable) -> IoResult<Self> {
        let table = Self {
            geometry,
            attributes,
            fields: BTreeMap::new(),
        };
        table.check_rows()?;
        Ok(table)
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.geometry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    /// Shape type of the first feature
    pub fn shape_type(&self) -> Option<ShapeType> {
        self.geometry.first().map(|s| s.shapetype())
    }

    /// Field layout the attribute was read with, if it came from a file
    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Every attribute column must have one value per feature
    fn check_rows(&self) -> IoResult<()> {
        let expected = self.geometry.len();
        match self.attributes.iter().find(|(_, c)| c.len() != expected) {
            Some((_, column)) => Err(IoError::ShapeMismatch {
                expected,
                actual: column.len(),
            }),
            None => Ok(()),
        }
    }
}

impl Clone for VectorTable {
    fn clone(&self) -> Self {
        Self {
            geometry: self.geometry.iter().map(clone_shape).collect(),
            attributes: self.attributes.clone(),
            fields: self.fields.clone(),
        }
    }
}

impl PartialEq for VectorTable {
    fn eq(&self, other: &Self) -> bool {
        self.attributes == other.attributes
            && self.geometry.len() == other.geometry.len()
            && self
                .geometry
                .iter()
                .zip(&other.geometry)
                .all(|(a, b)| same_shape(a, b))
    }
}

impl fmt::Debug for VectorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorTable")
            .field(
                "geometry",
                &self.geometry.iter().map(shape_debug).collect::<Vec<_>>(),
            )
            .field("attributes", &self.attributes)
            .field("fields", &self.fields)
            .finish()
    }
}

fn clone_shape(shape: &Shape) -> Shape {
    match shape {
        Shape::NullShape => Shape::NullShape,
        Shape::Point(s) => Shape::Point(*s),
        Shape::PointM(s) => Shape::PointM(*s),
        Shape::PointZ(s) => Shape::PointZ(*s),
        Shape::Polyline(s) => Shape::Polyline(s.clone()),
        Shape::PolylineM(s) => Shape::PolylineM(s.clone()),
        Shape::PolylineZ(s) => Shape::PolylineZ(s.clone()),
        Shape::Polygon(s) => Shape::Polygon(s.clone()),
        Shape::PolygonM(s) => Shape::PolygonM(s.clone()),
        Shape::PolygonZ(s) => Shape::PolygonZ(s.clone()),
        Shape::Multipoint(s) => Shape::Multipoint(s.clone()),
        Shape::MultipointM(s) => Shape::MultipointM(s.clone()),
        Shape::MultipointZ(s) => Shape::MultipointZ(s.clone()),
        Shape::Multipatch(s) => Shape::Multipatch(s.clone()),
    }
}

fn same_shape(a: &Shape, b: &Shape) -> bool {
    match (a, b) {
        (Shape::NullShape, Shape::NullShape) => true,
        (Shape::Point(a), Shape::Point(b)) => a == b,
        (Shape::PointM(a), Shape::PointM(b)) => a == b,
        (Shape::PointZ(a), Shape::PointZ(b)) => a == b,
        (Shape::Polyline(a), Shape::Polyline(b)) => a == b,
        (Shape::PolylineM(a), Shape::PolylineM(b)) => a == b,
        (Shape::PolylineZ(a), Shape::PolylineZ(b)) => a == b,
        (Shape::Polygon(a), Shape::Polygon(b)) => a == b,
        (Shape::PolygonM(a), Shape::PolygonM(b)) => a == b,
        (Shape::PolygonZ(a), Shape::PolygonZ(b)) => a == b,
        (Shape::Multipoint(a), Shape::Multipoint(b)) => a == b,
        (Shape::MultipointM(a), Shape::MultipointM(b)) => a == b,
        (Shape::MultipointZ(a), Shape::MultipointZ(b)) => a == b,
        (Shape::Multipatch(a), Shape::Multipatch(b)) => a == b,
        _ => false,
    }
}

fn shape_debug(shape: &Shape) -> &dyn fmt::Debug {
    match shape {
        Shape::NullShape => &"NullShape",
        Shape::Point(s) => s,
        Shape::PointM(s) => s,
        Shape::PointZ(s) => s,
        Shape::Polyline(s) => s,
        Shape::PolylineM(s) => s,
        Shape::PolylineZ(s) => s,
        Shape::Polygon(s) => s,
        Shape::PolygonM(s) => s,
        Shape::PolygonZ(s) => s,
        Shape::Multipoint(s) => s,
        Shape::MultipointM(s) => s,
        Shape::MultipointZ(s) => s,
        Shape::Multipatch(s) => s,
    }
}

/// Shapefile codec.
///
/// Attribute columns keep the field order of the `.dbf` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapefileCodec;

impl ShapefileCodec {
    pub fn new() -> Self {
        Self
    }
}

impl PayloadCodec for ShapefileCodec {
    type Payload = VectorTable;

    fn read(&self, path: &Path) -> IoResult<VectorTable> {
        ensure_exists(path)?;

        let dbf_path = path.with_extension("dbf");
        let dbase_reader =
            shapefile::dbase::Reader::from_path(&dbf_path).map_err(shapefile::Error::from)?;
        let decimals = read_decimal_counts(&dbf_path, dbase_reader.fields().len())?;
        let fields: Vec<(String, FieldSpec)> = dbase_reader
            .fields()
            .iter()
            .zip(decimals)
            .map(|(info, decimals)| {
                let spec = FieldSpec::new(info.field_type(), info.length(), decimals);
                (info.name().to_string(), spec)
            })
            .collect();

        let mut reader = shapefile::Reader::new(ShapeReader::from_path(path)?, dbase_reader);
        let mut geometry = Vec::new();
        let mut records = Vec::new();
        for shape_record in reader.iter_shapes_and_records() {
            let (shape, record) = shape_record?;
            geometry.push(shape);
            records.push(record);
        }

        let mut attributes = DataTable::new();
        for (name, spec) in &fields {
            let values = records
                .iter()
                .map(|r| {
                    r.get(name).cloned().ok_or_else(|| {
                        IoError::InvalidFormat(format!("record missing field {}", name))
                    })
                })
                .collect::<IoResult<Vec<_>>>()?;
            let column = column_from_values(name, spec.field_type, values)?;
            attributes.add_column(name.clone(), column)?;
        }

        let mut table = VectorTable::new(geometry, attributes)?;
        table.fields = fields.into_iter().collect();
        Ok(table)
    }

    fn write(&self, table: &VectorTable, path: &Path) -> IoResult<()> {
        table.check_rows()?;
        if let Some(row) = table
            .geometry
            .iter()
            .position(|s| matches!(s, Shape::NullShape))
        {
            return Err(IoError::Unsupported(format!("null shape at feature {}", row)));
        }

        let mut builder = TableWriterBuilder::new();
        let mut specs = Vec::with_capacity(table.attributes.num_columns());
        for (name, column) in table.attributes.iter() {
            let field = FieldName::try_from(name)
                .map_err(|_| IoError::InvalidFormat(format!("invalid dBASE field name: {}", name)))?;
            let spec = planned_field(column, table.field_spec(name));
            builder = match spec.field_type {
                FieldType::Character => builder.add_character_field(field, spec.length),
                FieldType::Numeric => builder.add_numeric_field(field, spec.length, spec.decimals),
                FieldType::Float => builder.add_float_field(field, spec.length, spec.decimals),
                FieldType::Double => builder.add_double_field(field),
                FieldType::Integer => builder.add_integer_field(field),
                FieldType::Logical => builder.add_logical_field(field),
                other => {
                    return Err(IoError::Unsupported(format!(
                        "writing {:?} field {}",
                        other, name
                    )))
                }
            };
            specs.push(spec);
        }

        // every value is converted before the destination is truncated
        let records = (0..table.geometry.len())
            .map(|row| record_for_row(&table.attributes, &specs, row))
            .collect::<IoResult<Vec<_>>>()?;

        let mut writer = shapefile::Writer::from_path(path, builder)?;
        for (shape, record) in table.geometry.iter().zip(&records) {
            match shape {
                Shape::Point(s) => writer.write_shape_and_record(s, record)?,
                Shape::PointM(s) => writer.write_shape_and_record(s, record)?,
                Shape::PointZ(s) => writer.write_shape_and_record(s, record)?,
                Shape::Polyline(s) => writer.write_shape_and_record(s, record)?,
                Shape::PolylineM(s) => writer.write_shape_and_record(s, record)?,
                Shape::PolylineZ(s) => writer.write_shape_and_record(s, record)?,
                Shape::Polygon(s) => writer.write_shape_and_record(s, record)?,
                Shape::PolygonM(s) => writer.write_shape_and_record(s, record)?,
                Shape::PolygonZ(s) => writer.write_shape_and_record(s, record)?,
                Shape::Multipoint(s) => writer.write_shape_and_record(s, record)?,
                Shape::MultipointM(s) => writer.write_shape_and_record(s, record)?,
                Shape::MultipointZ(s) => writer.write_shape_and_record(s, record)?,
                Shape::Multipatch(s) => writer.write_shape_and_record(s, record)?,
                Shape::NullShape => {}
            }
        }
        // headers are finalized when the writer is dropped
        drop(writer);

        Ok(())
    }

    fn format_name(&self) -> &'static str {
        "ESRI Shapefile"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["shp"]
    }
}

/// Decimal counts of the first `count` field descriptors. The dBASE reader
/// parses them but does not expose them.
fn read_decimal_counts(dbf_path: &Path, count: usize) -> IoResult<Vec<u8>> {
    let mut header = vec![0u8; DBF_BLOCK * (count + 1)];
    File::open(dbf_path)?.read_exact(&mut header)?;
    Ok((1..=count)
        .map(|i| header[DBF_BLOCK * i + DBF_DECIMALS_OFFSET])
        .collect())
}

/// Field layout to write for a column: the layout it was read with when
/// the values still fit it, otherwise a fresh one for the column type
fn planned_field(column: &DataColumn, read: Option<&FieldSpec>) -> FieldSpec {
    match column {
        DataColumn::String(values) => {
            let needed = values.iter().map(|s| s.len()).max().unwrap_or(1);
            let kept = read
                .filter(|s| s.field_type == FieldType::Character)
                .map_or(0, |s| s.length as usize);
            let width = needed.max(kept).clamp(1, MAX_CHARACTER_WIDTH);
            FieldSpec::new(FieldType::Character, width as u8, 0)
        }
        DataColumn::Float64(values) => match read {
            Some(spec) if spec.field_type == FieldType::Double => *spec,
            Some(spec)
                if matches!(spec.field_type, FieldType::Numeric | FieldType::Float)
                    && spec.holds(values) =>
            {
                *spec
            }
            _ => FieldSpec::new(FieldType::Numeric, NUMERIC_WIDTH, NUMERIC_DECIMALS),
        },
        DataColumn::Int32(_) | DataColumn::Int64(_) => FieldSpec::new(FieldType::Integer, 4, 0),
        DataColumn::Bool(_) => FieldSpec::new(FieldType::Logical, 1, 0),
    }
}

fn type_error(name: &str, value: &FieldValue) -> IoError {
    IoError::InvalidFormat(format!(
        "field {} mixes value types: unexpected {:?}",
        name, value
    ))
}

/// Build one typed column from a field's values
fn column_from_values(
    name: &str,
    field_type: FieldType,
    values: Vec<FieldValue>,
) -> IoResult<DataColumn> {
    let column = match field_type {
        FieldType::Character => DataColumn::String(
            values
                .into_iter()
                .map(|v| match v {
                    FieldValue::Character(s) => Ok(s.unwrap_or_default()),
                    other => Err(type_error(name, &other)),
                })
                .collect::<IoResult<_>>()?,
        ),
        FieldType::Numeric | FieldType::Float | FieldType::Double => DataColumn::Float64(
            values
                .into_iter()
                .map(|v| match v {
                    FieldValue::Numeric(x) => Ok(x.unwrap_or(f64::NAN)),
                    FieldValue::Float(x) => Ok(x.map(f64::from).unwrap_or(f64::NAN)),
                    FieldValue::Double(x) => Ok(x),
                    other => Err(type_error(name, &other)),
                })
                .collect::<IoResult<_>>()?,
        ),
        FieldType::Integer => DataColumn::Int32(
            values
                .into_iter()
                .map(|v| match v {
                    FieldValue::Integer(x) => Ok(x),
                    other => Err(type_error(name, &other)),
                })
                .collect::<IoResult<_>>()?,
        ),
        FieldType::Logical => DataColumn::Bool(
            values
                .into_iter()
                .map(|v| match v {
                    FieldValue::Logical(x) => Ok(x.unwrap_or(false)),
                    other => Err(type_error(name, &other)),
                })
                .collect::<IoResult<_>>()?,
        ),
        // dates, memos and currency are kept as their debug text
        _ => DataColumn::String(values.iter().map(|v| format!("{:?}", v)).collect()),
    };
    Ok(column)
}

/// Row values as a dBASE record. Callers check column lengths first.
fn record_for_row(attributes: &DataTable, specs: &[FieldSpec], row: usize) -> IoResult<Record> {
    let mut record = Record::default();
    for ((name, column), spec) in attributes.iter().zip(specs) {
        let value = match column {
            DataColumn::String(v) => FieldValue::Character(Some(v[row].clone())),
            DataColumn::Float64(v) => {
                let x = v[row];
                let present = if x.is_nan() { None } else { Some(x) };
                match spec.field_type {
                    FieldType::Double => FieldValue::Double(x),
                    FieldType::Float => FieldValue::Float(present.map(|x| x as f32)),
                    _ => FieldValue::Numeric(present),
                }
            }
            DataColumn::Int32(v) => FieldValue::Integer(v[row]),
            DataColumn::Int64(v) => FieldValue::Integer(i32::try_from(v[row]).map_err(|_| {
                IoError::Unsupported(format!(
                    "value {} in field {} does not fit a dBASE integer",
                    v[row], name
                ))
            })?),
            DataColumn::Bool(v) => FieldValue::Logical(Some(v[row])),
        };
        record.insert(name.to_string(), value);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefile::{Point, Polygon, PolygonRing};

    fn sites() -> VectorTable {
        let geometry = vec![
            Shape::Point(Point::new(1.0, 2.0)),
            Shape::Point(Point::new(-3.5, 4.25)),
        ];
        let attributes = DataTable::new()
            .with_column(
                "name",
                DataColumn::String(vec!["north".to_string(), "south".to_string()]),
            )
            .unwrap()
            .with_column("depth", DataColumn::Float64(vec![12.5, 0.25]))
            .unwrap()
            .with_column("count", DataColumn::Int32(vec![3, 7]))
            .unwrap()
            .with_column("active", DataColumn::Bool(vec![true, false]))
            .unwrap();
        VectorTable::new(geometry, attributes).unwrap()
    }

    /// A shapefile whose `pop` field is declared N(10,0)
    fn write_census(path: &Path) {
        let builder = TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("tract").unwrap(), 12)
            .add_numeric_field(FieldName::try_from("pop").unwrap(), 10, 0);
        let mut writer = shapefile::Writer::from_path(path, builder).unwrap();
        for (i, pop) in [1200.0, 75.0].into_iter().enumerate() {
            let mut record = Record::default();
            record.insert(
                "tract".to_string(),
                FieldValue::Character(Some(format!("T{}", i))),
            );
            record.insert("pop".to_string(), FieldValue::Numeric(Some(pop)));
            writer
                .write_shape_and_record(&Point::new(i as f64, 0.0), &record)
                .unwrap();
        }
    }

    #[test]
    fn test_round_trip_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.shp");
        let table = sites();

        ShapefileCodec.write(&table, &path).unwrap();
        assert!(dir.path().join("sites.dbf").exists());
        assert!(dir.path().join("sites.shx").exists());

        let read = ShapefileCodec.read(&path).unwrap();
        assert_eq!(read, table);
        assert_eq!(
            read.attributes.column_names(),
            vec!["name", "depth", "count", "active"]
        );
        assert_eq!(read.shape_type(), Some(ShapeType::Point));
    }

    #[test]
    fn test_round_trip_polygon() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lots.shp");
        let ring = PolygonRing::Outer(vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 0.0),
        ]);
        let attributes = DataTable::new()
            .with_column("lot", DataColumn::Int32(vec![42]))
            .unwrap();
        let table =
            VectorTable::new(vec![Shape::Polygon(Polygon::new(ring))], attributes).unwrap();

        ShapefileCodec.write(&table, &path).unwrap();
        assert_eq!(ShapefileCodec.read(&path).unwrap(), table);
    }

    #[test]
    fn test_clone_and_eq_compare_geometry() {
        let table = sites();
        let copy = table.clone();
        assert_eq!(copy, table);

        let mut moved = table.clone();
        moved.geometry[1] = Shape::Point(Point::new(0.0, 0.0));
        assert_ne!(moved, table);
        assert!(format!("{:?}", table).contains("VectorTable"));
    }

    #[test]
    fn test_rewrite_keeps_field_layout() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("census.shp");
        write_census(&source);

        let table = ShapefileCodec.read(&source).unwrap();
        assert_eq!(table.attributes.column_names(), vec!["tract", "pop"]);
        assert_eq!(
            table.field_spec("pop"),
            Some(&FieldSpec::new(FieldType::Numeric, 10, 0))
        );

        let copy = dir.path().join("census_copy.shp");
        ShapefileCodec.write(&table, &copy).unwrap();
        let reread = ShapefileCodec.read(&copy).unwrap();

        assert_eq!(reread, table);
        assert_eq!(reread.attributes.column_names(), vec!["tract", "pop"]);
        assert_eq!(
            reread.field_spec("pop"),
            Some(&FieldSpec::new(FieldType::Numeric, 10, 0))
        );
        assert_eq!(
            reread.field_spec("tract"),
            Some(&FieldSpec::new(FieldType::Character, 12, 0))
        );
    }

    #[test]
    fn test_values_outside_layout_widen_the_field() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("census.shp");
        write_census(&source);

        let mut table = ShapefileCodec.read(&source).unwrap();
        if let Some(DataColumn::Float64(pop)) = table.attributes.column_mut("pop") {
            pop[1] = 75.5;
        }
        let copy = dir.path().join("census_copy.shp");
        ShapefileCodec.write(&table, &copy).unwrap();
        let reread = ShapefileCodec.read(&copy).unwrap();

        assert_eq!(
            reread.attributes.column("pop"),
            Some(&DataColumn::Float64(vec![1200.0, 75.5]))
        );
        assert_eq!(
            reread.field_spec("pop"),
            Some(&FieldSpec::new(FieldType::Numeric, NUMERIC_WIDTH, NUMERIC_DECIMALS))
        );
    }

    #[test]
    fn test_field_spec_holds() {
        let integral = FieldSpec::new(FieldType::Numeric, 10, 0);
        assert!(integral.holds(&[1200.0, f64::NAN]));
        assert!(!integral.holds(&[1.5]));
        assert!(!integral.holds(&[12345678901.0]));

        let float = FieldSpec::new(FieldType::Float, 13, 3);
        assert!(float.holds(&[f64::from(0.1f32)]));
    }

    #[test]
    fn test_new_rejects_row_mismatch() {
        let attributes = DataTable::new()
            .with_column("id", DataColumn::Int32(vec![1, 2]))
            .unwrap();
        let err = VectorTable::new(vec![Shape::Point(Point::new(0.0, 0.0))], attributes)
            .unwrap_err();
        assert!(matches!(err, IoError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_write_rejects_ragged_attributes_and_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.shp");
        let mut table = sites();
        ShapefileCodec.write(&table, &path).unwrap();
        let before = std::fs::read(dir.path().join("sites.dbf")).unwrap();

        *table.attributes.column_mut("name").unwrap() =
            DataColumn::String(vec!["north".to_string()]);
        let err = ShapefileCodec.write(&table, &path).unwrap_err();

        assert!(matches!(
            err,
            IoError::ShapeMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(std::fs::read(dir.path().join("sites.dbf")).unwrap(), before);
    }

    #[test]
    fn test_column_from_values_rejects_mixed_types() {
        let values = vec![
            FieldValue::Integer(1),
            FieldValue::Character(Some("x".to_string())),
        ];
        assert!(column_from_values("mixed", FieldType::Integer, values).is_err());
    }

    #[test]
    fn test_write_rejects_long_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let attributes = DataTable::new()
            .with_column("much_too_long_name", DataColumn::Int32(vec![1]))
            .unwrap();
        let table =
            VectorTable::new(vec![Shape::Point(Point::new(0.0, 0.0))], attributes).unwrap();

        assert!(ShapefileCodec
            .write(&table, &dir.path().join("bad.shp"))
            .is_err());
    }
}
