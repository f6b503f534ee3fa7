//! Model definition (`mdef`) parsing.
//!
//! ```text
//! 0.3
//! <n> n_base
//! <n> n_tri
//! <n> n_state_map
//! <n> n_tied_state
//! <n> n_tied_ci_state
//! <n> n_tied_tmat
//! <name> <left> <right> <position> <attribute> <tmat> <state id>... N
//! ```
//!
//! Base phone rows come first, with `-` for left, right and position.
//! Triphone rows follow, with concrete context and position and `n/a` as
//! the attribute.

use super::core::ModelLoader;
use crate::error::{FormatError, InvariantError, Result};
use crate::format::TokenReader;
use crate::hmm::{HmmManager, HmmPosition, SenoneHmm, SenoneSequence};
use crate::pool::{PREALLOCATION_LIMIT, Pool};
use crate::senone::Senone;
use crate::unit::{Context, ContextSide, Unit, UnitManager};
use ndarray::Array2;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

/// Supported model definition version.
pub const MODEL_VERSION: &str = "0.3";

const FILLER: &str = "filler";
const PLACEHOLDER: &str = "-";
const NOT_APPLICABLE: &str = "n/a";
const END_OF_ROW: &str = "N";

/// Counts declared at the top of a model definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelDefinitionHeader {
    pub num_base: usize,
    pub num_tri: usize,
    pub num_state_map: usize,
    pub num_tied_state: usize,
    pub num_ci_tied_state: usize,
    pub num_tied_tmat: usize,
}

impl ModelDefinitionHeader {
    pub fn read(reader: &mut TokenReader) -> Result<Self> {
        let version = reader.get_string()?;
        if version != MODEL_VERSION {
            return Err(FormatError::UnsupportedVersion {
                path: reader.path().to_path_buf(),
                expected: MODEL_VERSION,
                found: Some(version),
            }
            .into());
        }

        let mut labeled = |label: &'static str| -> Result<usize> {
            let value = reader.get_count(label)?;
            reader.expect_string(label)?;
            Ok(value)
        };

        Ok(Self {
            num_base: labeled("n_base")?,
            num_tri: labeled("n_tri")?,
            num_state_map: labeled("n_state_map")?,
            num_tied_state: labeled("n_tied_state")?,
            num_ci_tied_state: labeled("n_tied_ci_state")?,
            num_tied_tmat: labeled("n_tied_tmat")?,
        })
    }

    /// States per HMM, including the non-emitting final state.
    pub fn states_per_hmm(&self) -> usize {
        match self.num_base.saturating_add(self.num_tri) {
            0 => 0,
            phones => self.num_state_map / phones,
        }
    }

    fn validate(
        &self,
        senones: &Pool<Arc<Senone>>,
        matrices: &Pool<Arc<Array2<f32>>>,
    ) -> Result<()> {
        if self.num_tied_state != senones.len() {
            return Err(InvariantError::SizeMismatch {
                what: "n_tied_state",
                expected: senones.len(),
                actual: self.num_tied_state,
            }
            .into());
        }
        if self.num_tied_tmat != matrices.len() {
            return Err(InvariantError::SizeMismatch {
                what: "n_tied_tmat",
                expected: matrices.len(),
                actual: self.num_tied_tmat,
            }
            .into());
        }
        if self.num_base.saturating_add(self.num_tri) == 0 {
            return Err(InvariantError::Topology("no base phones or triphones".into()).into());
        }
        if self.states_per_hmm() < 2 {
            return Err(InvariantError::Topology(format!(
                "{} states per HMM from n_state_map {}",
                self.states_per_hmm(),
                self.num_state_map
            ))
            .into());
        }
        if self.num_ci_tied_state > self.num_tied_state {
            return Err(InvariantError::Topology(format!(
                "n_tied_ci_state {} exceeds n_tied_state {}",
                self.num_ci_tied_state, self.num_tied_state
            ))
            .into());
        }
        Ok(())
    }
}

/// Parsed model definition.
#[derive(Debug)]
pub struct ModelDefinition {
    pub header: ModelDefinitionHeader,
    pub hmm_manager: HmmManager,
    /// Base phone units in file order
    pub context_independent_units: Vec<Arc<Unit>>,
}

impl ModelLoader {
    /// Parse a model definition into HMMs over `senones` and `matrices`.
    pub fn load_model_definition(
        &self,
        mut reader: TokenReader,
        units: &UnitManager,
        senones: &Pool<Arc<Senone>>,
        matrices: &Pool<Arc<Array2<f32>>>,
    ) -> Result<ModelDefinition> {
        tracing::debug!(path = %reader.path().display(), "loading model definition");
        read_model_definition(
            &mut reader,
            units,
            senones,
            matrices,
            self.config().use_cd_units,
        )
    }
}

/// One row of either section.
struct Row {
    line: usize,
    name: String,
    left: String,
    right: String,
    position: String,
    attribute: String,
    tmat: usize,
    state_ids: Vec<usize>,
}

impl Row {
    fn read(reader: &mut TokenReader, num_state_ids: usize) -> Result<Self> {
        let name = reader.get_string()?;
        let line = reader.line();
        let left = reader.get_string()?;
        let right = reader.get_string()?;
        let position = reader.get_string()?;
        let attribute = reader.get_string()?;
        let tmat = reader.get_count("tmat")?;
        let state_ids = (0..num_state_ids)
            .map(|_| reader.get_count("state id"))
            .collect::<Result<Vec<_>>>()?;
        reader.expect_string(END_OF_ROW)?;

        Ok(Self {
            line,
            name,
            left,
            right,
            position,
            attribute,
            tmat,
            state_ids,
        })
    }

    fn check_state_ids(&self, range: Range<usize>) -> Result<()> {
        match self.state_ids.iter().copied().find(|id| !range.contains(id)) {
            Some(id) => Err(InvariantError::StateIdOutOfRange {
                unit: self.name.clone(),
                id,
                start: range.start,
                end: range.end,
            }
            .into()),
            None => Ok(()),
        }
    }

    fn transition_matrix(&self, matrices: &Pool<Arc<Array2<f32>>>) -> Result<Arc<Array2<f32>>> {
        matrices.get(self.tmat).cloned().ok_or_else(|| {
            InvariantError::TransitionMatrixOutOfRange {
                unit: self.name.clone(),
                index: self.tmat,
                count: matrices.len(),
            }
            .into()
        })
    }
}

struct Parser<'a> {
    reader: &'a mut TokenReader,
    units: &'a UnitManager,
    senones: &'a Pool<Arc<Senone>>,
    matrices: &'a Pool<Arc<Array2<f32>>>,
    manager: HmmManager,
    ci_units: Vec<Arc<Unit>>,
    ci_by_name: HashMap<String, Arc<Unit>>,
}

impl Parser<'_> {
    fn unexpected(&self, line: usize, expected: &str, found: &str) -> crate::error::Error {
        FormatError::UnexpectedToken {
            path: self.reader.path().to_path_buf(),
            line,
            expected: expected.to_string(),
            found: found.to_string(),
        }
        .into()
    }

    fn senone_sequence(&self, row: &Row) -> Result<Arc<SenoneSequence>> {
        let senones = row
            .state_ids
            .iter()
            .map(|&id| {
                self.senones.get(id).cloned().ok_or_else(|| {
                    InvariantError::StateIdOutOfRange {
                        unit: row.name.clone(),
                        id,
                        start: 0,
                        end: self.senones.len(),
                    }
                    .into()
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(SenoneSequence::new(senones)))
    }

    fn insert(&self, hmm: SenoneHmm) {
        tracing::trace!(unit = %hmm.unit(), position = %hmm.position(), "loaded hmm");
        if let Some(old) = self.manager.put(Arc::new(hmm)) {
            tracing::warn!(
                unit = %old.unit(),
                position = %old.position(),
                "duplicate model definition row replaces earlier hmm"
            );
        }
    }

    fn base_phone(&mut self, row: Row, header: &ModelDefinitionHeader) -> Result<()> {
        for field in [&row.left, &row.right, &row.position] {
            if field != PLACEHOLDER {
                return Err(self.unexpected(row.line, PLACEHOLDER, field));
            }
        }
        row.check_state_ids(0..header.num_ci_tied_state)?;
        let matrix = row.transition_matrix(self.matrices)?;

        let unit = self.units.get_ci_unit(&row.name, row.attribute == FILLER);
        if self.ci_by_name.insert(row.name.clone(), Arc::clone(&unit)).is_none() {
            self.ci_units.push(Arc::clone(&unit));
        }

        let senones = self.senone_sequence(&row)?;
        self.insert(SenoneHmm::new(unit, senones, matrix, HmmPosition::Undefined));
        Ok(())
    }

    /// Context unit for a triphone side. Names missing from the base phones
    /// are interned as plain units.
    fn context_unit(&mut self, name: &str) -> Arc<Unit> {
        if let Some(unit) = self.ci_by_name.get(name) {
            return Arc::clone(unit);
        }
        tracing::warn!(name, "context unit is not a base phone");
        let unit = self.units.get_ci_unit(name, false);
        self.ci_by_name.insert(name.to_string(), Arc::clone(&unit));
        unit
    }

    fn position(&self, row: &Row) -> Result<HmmPosition> {
        match HmmPosition::from_token(&row.position) {
            Some(HmmPosition::Undefined) | None => Err(FormatError::InvalidPosition {
                path: self.reader.path().to_path_buf(),
                line: row.line,
                found: row.position.clone(),
            }
            .into()),
            Some(position) => Ok(position),
        }
    }

    fn triphones(&mut self, header: &ModelDefinitionHeader, use_cd_units: bool) -> Result<()> {
        let states = header.states_per_hmm() - 1;
        let mut last: Option<(String, String, String, Arc<Unit>)> = None;
        let mut last_sequence: Option<(Vec<usize>, Arc<SenoneSequence>)> = None;

        for _ in 0..header.num_tri {
            let row = Row::read(self.reader, states)?;

            for field in [&row.left, &row.right] {
                if field == PLACEHOLDER {
                    return Err(self.unexpected(row.line, "context unit", field));
                }
            }
            let position = self.position(&row)?;
            if row.attribute != NOT_APPLICABLE {
                return Err(self.unexpected(row.line, NOT_APPLICABLE, &row.attribute));
            }
            row.check_state_ids(header.num_ci_tied_state..header.num_tied_state)?;
            let matrix = row.transition_matrix(self.matrices)?;

            if !use_cd_units {
                continue;
            }

            let unit = match &last {
                Some((name, left, right, unit))
                    if *name == row.name && *left == row.left && *right == row.right =>
                {
                    Arc::clone(unit)
                }
                _ => {
                    let left = self.context_unit(&row.left);
                    let right = self.context_unit(&row.right);
                    let context = Context::left_right(
                        ContextSide::units([left]),
                        ContextSide::units([right]),
                    );
                    self.units.get_unit(&row.name, false, context)
                }
            };

            let senones = match &last_sequence {
                Some((ids, sequence)) if *ids == row.state_ids => Arc::clone(sequence),
                _ => self.senone_sequence(&row)?,
            };

            self.insert(SenoneHmm::new(
                Arc::clone(&unit),
                Arc::clone(&senones),
                matrix,
                position,
            ));
            last = Some((row.name, row.left, row.right, unit));
            last_sequence = Some((row.state_ids, senones));
        }

        Ok(())
    }
}

/// Parse a model definition from `reader`.
///
/// With `use_cd_units` off, triphone rows are still read and validated but
/// produce no HMMs.
pub fn read_model_definition(
    reader: &mut TokenReader,
    units: &UnitManager,
    senones: &Pool<Arc<Senone>>,
    matrices: &Pool<Arc<Array2<f32>>>,
    use_cd_units: bool,
) -> Result<ModelDefinition> {
    let header = ModelDefinitionHeader::read(reader)?;
    header.validate(senones, matrices)?;
    tracing::debug!(?header, states_per_hmm = header.states_per_hmm(), "model definition header");

    let mut parser = Parser {
        reader,
        units,
        senones,
        matrices,
        manager: HmmManager::new(),
        ci_units: Vec::with_capacity(header.num_base.min(PREALLOCATION_LIMIT)),
        ci_by_name: HashMap::with_capacity(header.num_base.min(PREALLOCATION_LIMIT)),
    };

    let states = header.states_per_hmm() - 1;
    for _ in 0..header.num_base {
        let row = Row::read(parser.reader, states)?;
        parser.base_phone(row, &header)?;
    }
    parser.triphones(&header, use_cd_units)?;

    Ok(ModelDefinition {
        header,
        hmm_manager: parser.manager,
        context_independent_units: parser.ci_units,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::logmath::LogMath;
    use crate::senone::GaussianMixture;
    use ndarray::Array1;

    const TOY: &str = "\
0.3
2 n_base
1 n_tri
6 n_state_map
3 n_tied_state
2 n_tied_ci_state
1 n_tied_tmat
# base phones
SIL - - - filler 0 0 N
AA - - - n/a 0 1 N
# triphones
AA B D b n/a 0 2 N
";

    fn senones(count: usize) -> Pool<Arc<Senone>> {
        let log_math = LogMath::default();
        let mut pool = Pool::new("senones");
        for id in 0..count {
            pool.push(Arc::new(Senone::from(GaussianMixture::new(
                id,
                Vec::new(),
                Array1::zeros(0),
                log_math,
            ))));
        }
        pool
    }

    fn matrices(count: usize) -> Pool<Arc<Array2<f32>>> {
        let mut pool = Pool::new("transition_matrices");
        for _ in 0..count {
            pool.push(Arc::new(Array2::zeros((2, 2))));
        }
        pool
    }

    fn parse(text: &str, use_cd_units: bool) -> Result<(UnitManager, ModelDefinition)> {
        let units = UnitManager::new();
        let mut reader = TokenReader::new("models.mdef", text);
        let definition =
            read_model_definition(&mut reader, &units, &senones(3), &matrices(1), use_cd_units)?;
        Ok((units, definition))
    }

    #[test]
    fn builds_base_and_triphone_hmms() {
        let (units, definition) = parse(TOY, true).unwrap();

        assert_eq!(definition.header.states_per_hmm(), 2);
        assert_eq!(definition.hmm_manager.len(), 3);
        assert_eq!(definition.context_independent_units.len(), 2);

        let sil = definition
            .hmm_manager
            .get(HmmPosition::Undefined, units.silence())
            .unwrap();
        assert_eq!(sil.senone_sequence().get(0).unwrap().id(), Some(0));

        let b = units.get_ci_unit("B", false);
        let d = units.get_ci_unit("D", false);
        let triphone = units.get_unit(
            "AA",
            false,
            Context::left_right(ContextSide::units([b]), ContextSide::units([d])),
        );
        let hmm = definition
            .hmm_manager
            .get(HmmPosition::Begin, &triphone)
            .unwrap();
        assert_eq!(hmm.senone_sequence().get(0).unwrap().id(), Some(2));
    }

    #[test]
    fn skips_triphones_without_cd_units() {
        let (_, definition) = parse(TOY, false).unwrap();

        assert_eq!(definition.hmm_manager.len(), 2);
    }

    #[test]
    fn rejects_unknown_version() {
        let result = parse(&TOY.replacen("0.3", "0.2", 1), true);

        assert!(matches!(
            result,
            Err(Error::Format(FormatError::UnsupportedVersion { expected: "0.3", .. }))
        ));
    }

    #[test]
    fn rejects_wrong_header_label() {
        let result = parse(&TOY.replace("1 n_tri", "1 n_triphones"), true);

        assert!(matches!(
            result,
            Err(Error::Format(FormatError::UnexpectedToken { line: 3, .. }))
        ));
    }

    #[test]
    fn tied_state_count_must_match_senones() {
        let result = parse(&TOY.replace("3 n_tied_state", "4 n_tied_state"), true);

        assert!(matches!(
            result,
            Err(Error::Invariant(InvariantError::SizeMismatch { what: "n_tied_state", .. }))
        ));
    }

    #[test]
    fn base_phone_ids_stay_in_ci_range() {
        let result = parse(&TOY.replace("AA - - - n/a 0 1 N", "AA - - - n/a 0 2 N"), true);

        assert!(matches!(
            result,
            Err(Error::Invariant(InvariantError::StateIdOutOfRange { id: 2, start: 0, end: 2, .. }))
        ));
    }

    #[test]
    fn triphone_ids_stay_in_cd_range() {
        let result = parse(&TOY.replace("AA B D b n/a 0 2 N", "AA B D b n/a 0 1 N"), true);

        assert!(matches!(
            result,
            Err(Error::Invariant(InvariantError::StateIdOutOfRange { id: 1, start: 2, end: 3, .. }))
        ));
    }

    #[test]
    fn base_phones_need_placeholders() {
        let result = parse(&TOY.replace("AA - - - n/a", "AA - - b n/a"), true);

        assert!(matches!(
            result,
            Err(Error::Format(FormatError::UnexpectedToken { line: 10, .. }))
        ));
    }

    #[test]
    fn rejects_bad_position() {
        let result = parse(&TOY.replace("AA B D b", "AA B D x"), true);

        assert!(matches!(
            result,
            Err(Error::Format(FormatError::InvalidPosition { ref found, .. })) if found == "x"
        ));
    }

    #[test]
    fn rejects_out_of_range_transition_matrix() {
        let result = parse(&TOY.replace("AA B D b n/a 0", "AA B D b n/a 3"), true);

        assert!(matches!(
            result,
            Err(Error::Invariant(InvariantError::TransitionMatrixOutOfRange {
                index: 3,
                count: 1,
                ..
            }))
        ));
    }

    #[test]
    fn missing_row_terminator_is_format_error() {
        let result = parse(&TOY.replace("AA B D b n/a 0 2 N", "AA B D b n/a 0 2 X"), true);

        assert!(matches!(result, Err(Error::Format(FormatError::UnexpectedToken { .. }))));
    }

    #[test]
    fn repeated_triphone_reuses_unit_and_sequence() {
        let text = TOY
            .replace("1 n_tri", "2 n_tri")
            .replace("6 n_state_map", "8 n_state_map")
            .replace("AA B D b n/a 0 2 N\n", "AA B D b n/a 0 2 N\nAA B D e n/a 0 2 N\n");

        let (_, definition) = parse(&text, true).unwrap();
        let hmms = definition.hmm_manager.hmms();
        let begin = &hmms[2];
        let end = &hmms[3];

        assert!(Arc::ptr_eq(begin.unit(), end.unit()));
        assert!(Arc::ptr_eq(begin.senone_sequence(), end.senone_sequence()));
        assert_eq!(end.position(), HmmPosition::End);
    }

    #[test]
    fn context_units_outside_base_phones_are_not_ci_units() {
        let (_, definition) = parse(TOY, true).unwrap();

        let names: Vec<_> = definition
            .context_independent_units
            .iter()
            .map(|u| u.name().to_string())
            .collect();

        assert_eq!(names, ["SIL", "AA"]);
    }
}
