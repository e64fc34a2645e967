use std::{collections::HashMap, path::Path};

use tracing::debug;

use crate::{datatypes::PolarSample, error::FoilgenError};

/// Namespace of the polar documents written by JavaFoil
pub const POLAR_NAMESPACE: &str = "http://www.mh-aerotools.de/polar-schema";

fn is_element(node: &roxmltree::Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn parse_number(text: &str) -> Result<f64, FoilgenError> {
    text.trim()
        .replace(',', ".")
        .parse()
        .map_err(|_| FoilgenError::Parser(format!("Non-float value '{}' in polar", text.trim())))
}

/// Parses the text of a polar document into samples
///
/// Variables are looked up by case-insensitive name. A sample value whose
/// variable is absent, or whose column is missing from a datapoint, is 0.0.
///
/// # Arguments
/// * `contents` - The XML document
///
/// # Returns
/// One sample per datapoint, in document order
pub fn parse_polar_str(contents: &str) -> Result<Vec<PolarSample>, FoilgenError> {
    let doc = match roxmltree::Document::parse(contents) {
        Ok(d) => d,
        Err(err) => {
            return Err(FoilgenError::Parser(format!("Malformed polar document: {err}")));
        }
    };

    let polar = match doc.descendants().find(|n| is_element(n, "polar")) {
        Some(p) => p,
        None => return Err(FoilgenError::Parser("No polar record in document".to_owned())),
    };
    if polar.tag_name().namespace() != Some(POLAR_NAMESPACE) {
        debug!("polar record outside the {POLAR_NAMESPACE} namespace");
    }

    // Map variable name to column index, first occurrence wins
    let mut columns: HashMap<String, usize> = HashMap::new();
    let variables = polar
        .descendants()
        .filter(|n| is_element(n, "variables"))
        .flat_map(|v| v.children().filter(|n| is_element(n, "variable")));
    for (i, variable) in variables.enumerate() {
        let name = variable.text().unwrap_or_default().trim().to_lowercase();
        columns.entry(name).or_insert(i);
    }

    let mut samples: Vec<PolarSample> = Vec::new();
    let datapoints = polar
        .descendants()
        .filter(|n| is_element(n, "datapoints"))
        .flat_map(|d| d.children().filter(|n| is_element(n, "datapoint")));

    for datapoint in datapoints {
        let values: Vec<f64> = datapoint
            .children()
            .filter(|n| is_element(n, "value"))
            .map(|v| parse_number(v.text().unwrap_or_default()))
            .collect::<Result<_, _>>()?;

        let value_of = |name: &str| -> f64 {
            columns
                .get(name)
                .and_then(|&i| values.get(i))
                .copied()
                .unwrap_or(0.0)
        };

        samples.push(PolarSample {
            alpha: value_of("alpha"),
            cl: value_of("cl"),
            cd: value_of("cd"),
            cm: value_of("cm"),
        });
    }

    Ok(samples)
}

/// Reads a polar document from disk
///
/// Any failure (missing file, malformed XML, no polar record, garbled
/// numbers) yields an empty vector so a single bad case cannot stop a sweep.
pub fn parse_polar(output_path: &Path) -> Vec<PolarSample> {
    let contents = match std::fs::read_to_string(output_path) {
        Ok(c) => c,
        Err(err) => {
            debug!(path = %output_path.display(), "unable to read polar: {err}");
            return Vec::new();
        }
    };

    match parse_polar_str(&contents) {
        Ok(samples) => samples,
        Err(err) => {
            debug!(path = %output_path.display(), "{err}");
            Vec::new()
        }
    }
}

/// Renders samples as a polar document in the layout [`parse_polar_str`] reads
#[cfg(test)]
pub fn render_polar(samples: &[PolarSample]) -> String {
    let mut doc = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
        <polars xmlns=\"{POLAR_NAMESPACE}\">\n\
        <polar>\n\
        <variables>\
        <variable>alpha</variable><variable>CL</variable>\
        <variable>CD</variable><variable>Cm</variable>\
        </variables>\n\
        <datapoints>\n"
    );
    for s in samples {
        let values: String = [s.alpha, s.cl, s.cd, s.cm]
            .iter()
            .map(|v| format!("<value>{v}</value>"))
            .collect();
        doc.push_str(&format!("<datapoint>{values}</datapoint>\n"));
    }
    doc.push_str("</datapoints>\n</polar>\n</polars>\n");
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_dir;
    use approx::assert_relative_eq;

    fn scratch_file(name: &str, contents: Option<&str>) -> std::path::PathBuf {
        let path = scratch_dir("parser").join(name);
        if let Some(text) = contents {
            std::fs::write(&path, text).unwrap();
        }
        path
    }

    const JAVAFOIL_POLAR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<polars xmlns="http://www.mh-aerotools.de/polar-schema">
  <polar>
    <name>NACA2412</name>
    <variables>
      <variable> Alpha </variable>
      <variable>Cl</variable>
      <variable>Cd</variable>
      <variable>Cm 0.25</variable>
      <variable>CM</variable>
    </variables>
    <datapoints>
      <datapoint>
        <value>-2,0</value><value>0,018</value><value>0,0071</value>
        <value>9</value><value>-0,051</value>
      </datapoint>
      <datapoint>
        <value>0.0</value><value>0.241</value><value>0.0068</value>
        <value>9</value><value>-0.052</value>
      </datapoint>
      <datapoint><value>2.0</value><value>0.463</value></datapoint>
    </datapoints>
  </polar>
</polars>
"#;

    #[test]
    fn reads_samples_by_variable_name() {
        let samples = parse_polar_str(JAVAFOIL_POLAR).unwrap();
        assert_eq!(samples.len(), 3);

        assert_relative_eq!(samples[0].alpha, -2.0);
        assert_relative_eq!(samples[0].cl, 0.018);
        assert_relative_eq!(samples[0].cd, 0.0071);
        assert_relative_eq!(samples[0].cm, -0.051);

        assert_relative_eq!(samples[1].alpha, 0.0);
        assert_relative_eq!(samples[1].cl, 0.241);
    }

    #[test]
    fn missing_columns_default_to_zero() {
        let samples = parse_polar_str(JAVAFOIL_POLAR).unwrap();
        assert_relative_eq!(samples[2].alpha, 2.0);
        assert_relative_eq!(samples[2].cl, 0.463);
        assert_eq!(samples[2].cd, 0.0);
        assert_eq!(samples[2].cm, 0.0);
    }

    #[test]
    fn absent_variables_default_to_zero() {
        let doc = r#"<polars><polar>
            <variables><variable>alpha</variable><variable>cl</variable></variables>
            <datapoints><datapoint><value>4</value><value>0.6</value></datapoint></datapoints>
        </polar></polars>"#;
        let samples = parse_polar_str(doc).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].cd, 0.0);
        assert_eq!(samples[0].cm, 0.0);
    }

    #[test]
    fn rendered_polar_reads_back() {
        let samples = vec![
            PolarSample { alpha: -1.0, cl: 0.1, cd: 0.01, cm: -0.02 },
            PolarSample { alpha: 1.0, cl: 0.3, cd: 0.011, cm: -0.03 },
        ];
        assert_eq!(parse_polar_str(&render_polar(&samples)).unwrap(), samples);
    }

    #[test]
    fn missing_file_is_empty() {
        let path = scratch_file("missing_polar.xml", None);
        assert!(parse_polar(&path).is_empty());
    }

    #[test]
    fn non_document_is_empty() {
        let path = scratch_file("garbage_polar.xml", Some("not xml at all <<"));
        assert!(parse_polar(&path).is_empty());
    }

    #[test]
    fn document_without_polar_is_empty() {
        let path = scratch_file("nopolar.xml", Some("<polars><other/></polars>"));
        assert!(parse_polar(&path).is_empty());
    }

    #[test]
    fn garbled_number_is_empty() {
        let doc = JAVAFOIL_POLAR.replace("0.241", "zero point two");
        let path = scratch_file("garbled_polar.xml", Some(&doc));
        assert!(parse_polar(&path).is_empty());
    }

    #[test]
    fn reads_valid_file() {
        let path = scratch_file("valid_polar.xml", Some(JAVAFOIL_POLAR));
        assert_eq!(parse_polar(&path).len(), 3);
    }
}
