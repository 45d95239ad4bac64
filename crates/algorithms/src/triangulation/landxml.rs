//! LandXML 1.2 export of a TIN surface
//!
//! Writes one `<Surface>` whose `<Definition surfType="TIN">` lists every
//! input point (`<P id="n">northing easting elevation</P>`, 1-based ids in
//! input order) and every retained triangle as `<F>i j k</F>`.

use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};
use terrasurf_core::Result;

use super::TriangulationResult;

const LANDXML_NS: &str = "http://www.landxml.org/schema/LandXML-1.2";

/// Options for LandXML export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandXmlOptions {
    pub surface_name: String,
    pub description: Option<String>,
}

impl Default for LandXmlOptions {
    fn default() -> Self {
        Self {
            surface_name: "terrasurf".to_string(),
            description: None,
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// A TIN borrowed for LandXML rendering
struct LandXml<'r, 'a> {
    tin: &'r TriangulationResult<'a>,
    options: &'r LandXmlOptions,
}

impl fmt::Display for LandXml<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tin.write_document(f, self.options)
    }
}

impl TriangulationResult<'_> {
    /// Render the surface as a LandXML 1.2 document.
    pub fn to_landxml(&self, options: &LandXmlOptions) -> String {
        LandXml { tin: self, options }.to_string()
    }

    /// Write the LandXML document to `writer`.
    pub fn write_landxml<W: Write>(&self, mut writer: W, options: &LandXmlOptions) -> Result<()> {
        write!(writer, "{}", LandXml { tin: self, options })?;
        writer.flush()?;
        Ok(())
    }

    fn write_document<F: fmt::Write>(&self, out: &mut F, options: &LandXmlOptions) -> fmt::Result {
        writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(out, r#"<LandXML xmlns="{LANDXML_NS}" version="1.2">"#)?;
        writeln!(
            out,
            r#"  <Units><Metric linearUnit="meter" areaUnit="squareMeter" volumeUnit="cubicMeter"/></Units>"#
        )?;
        writeln!(out, "  <Surfaces>")?;
        match &options.description {
            Some(desc) => writeln!(
                out,
                r#"    <Surface name="{}" desc="{}">"#,
                escape(&options.surface_name),
                escape(desc)
            )?,
            None => writeln!(out, r#"    <Surface name="{}">"#, escape(&options.surface_name))?,
        }
        writeln!(out, r#"      <Definition surfType="TIN">"#)?;

        writeln!(out, "        <Pnts>")?;
        for (i, p) in self.points.iter().enumerate() {
            writeln!(out, r#"          <P id="{}">{} {} {}</P>"#, i + 1, p.y, p.x, p.z)?;
        }
        writeln!(out, "        </Pnts>")?;

        writeln!(out, "        <Faces>")?;
        for t in &self.triangles {
            let [a, b, c] = t.vertices;
            writeln!(out, "          <F>{} {} {}</F>", a + 1, b + 1, c + 1)?;
        }
        writeln!(out, "        </Faces>")?;

        writeln!(out, "      </Definition>")?;
        writeln!(out, "    </Surface>")?;
        writeln!(out, "  </Surfaces>")?;
        writeln!(out, "</LandXML>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triangulation::{triangulate, TriangulationConfig};
    use terrasurf_core::SurveyPoint;

    fn tin_points() -> Vec<SurveyPoint> {
        vec![
            SurveyPoint::new(100.0, 200.0, 10.5),
            SurveyPoint::new(110.0, 200.0, 11.0),
            SurveyPoint::new(100.0, 210.0, 12.25),
        ]
    }

    #[test]
    fn test_landxml_structure() {
        let points = tin_points();
        let tin = triangulate(&points, &TriangulationConfig::default()).unwrap();
        let xml = tin.to_landxml(&LandXmlOptions {
            surface_name: "Site <A> & B".into(),
            description: None,
        });

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"version="1.2""#));
        assert!(xml.contains(r#"<Surface name="Site &lt;A&gt; &amp; B">"#));
        assert!(xml.contains(r#"<Definition surfType="TIN">"#));
        // northing first
        assert!(xml.contains(r#"<P id="1">200 100 10.5</P>"#));
        assert!(xml.contains(r#"<P id="3">210 100 12.25</P>"#));
        assert_eq!(xml.matches("<P ").count(), 3);
        assert_eq!(xml.matches("<F>").count(), 1);

        let face = xml
            .lines()
            .find_map(|l| l.trim().strip_prefix("<F>")?.strip_suffix("</F>"))
            .unwrap();
        let mut ids: Vec<usize> = face.split(' ').map(|s| s.parse().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(xml.trim_end().ends_with("</LandXML>"));
    }

    #[test]
    fn test_write_landxml_to_file() {
        let points = tin_points();
        let tin = triangulate(&points, &TriangulationConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface.xml");

        let options = LandXmlOptions {
            description: Some("test".into()),
            ..Default::default()
        };
        tin.write_landxml(std::fs::File::create(&path).unwrap(), &options)
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, tin.to_landxml(&options));
        assert!(written.contains(r#"desc="test""#));
    }

    /// Accepts a fixed number of bytes, then fails
    struct Budget(usize);

    impl fmt::Write for Budget {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.0 = self.0.checked_sub(s.len()).ok_or(fmt::Error)?;
            Ok(())
        }
    }

    #[test]
    fn test_document_propagates_write_errors() {
        let points = tin_points();
        let tin = triangulate(&points, &TriangulationConfig::default()).unwrap();
        let options = LandXmlOptions::default();
        let full = tin.to_landxml(&options).len();

        assert!(tin.write_document(&mut Budget(full), &options).is_ok());
        assert!(tin.write_document(&mut Budget(full - 1), &options).is_err());
        assert!(tin.write_document(&mut Budget(100), &options).is_err());
    }
}
