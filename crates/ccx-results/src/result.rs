//! Result sets and the result-file container shared by both readers.
//!
//! A [`ResultSet`] holds the values of one entity for one
//! (step, increment, set) combination. A [`ResultFile`] owns every result set
//! of a parsed file and answers filtered queries over them without touching
//! the file again.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ccx_results::{DatEntity, DatResult, ResultQuery};
//!
//! let dat = DatResult::from_file("job.dat")?;
//! let query = ResultQuery::new().entity(DatEntity::U).step_time(1.0);
//! for rs in dat.get_result_sets_by(&query) {
//!     let disp = rs.get_values_by_ids(&[1, 2, 3])?;
//!     println!("{} at t={}: {:?}", rs.entity, rs.step_time, disp.as_rows());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::entities::{
    AnalysisType, DatEntity, FrdEntity, MissingIds, ResultEntity, ResultLocation,
};
use crate::error::{Result, ResultError};
use crate::step_info::StepInfo;

/// Values of a result set keyed by node or element id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ResultValues {
    /// Nodal and element entities: one component vector per id
    Vectors(BTreeMap<u32, DVector<f64>>),
    /// Integration point entities: one (integration points x components)
    /// matrix per id
    IntegrationPoints(BTreeMap<u32, DMatrix<f64>>),
}

impl ResultValues {
    pub fn len(&self) -> usize {
        match self {
            ResultValues::Vectors(map) => map.len(),
            ResultValues::IntegrationPoints(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_id(&self, id: u32) -> bool {
        match self {
            ResultValues::Vectors(map) => map.contains_key(&id),
            ResultValues::IntegrationPoints(map) => map.contains_key(&id),
        }
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> Vec<u32> {
        match self {
            ResultValues::Vectors(map) => map.keys().copied().collect(),
            ResultValues::IntegrationPoints(map) => map.keys().copied().collect(),
        }
    }
}

/// Values of several ids stacked in request order.
#[derive(Debug, Clone, PartialEq)]
pub enum StackedValues {
    /// (ids x components)
    Rows(DMatrix<f64>),
    /// One (integration points x components) block per id
    Blocks(Vec<DMatrix<f64>>),
}

impl StackedValues {
    pub fn as_rows(&self) -> Option<&DMatrix<f64>> {
        match self {
            StackedValues::Rows(m) => Some(m),
            StackedValues::Blocks(_) => None,
        }
    }

    pub fn into_rows(self) -> Option<DMatrix<f64>> {
        match self {
            StackedValues::Rows(m) => Some(m),
            StackedValues::Blocks(_) => None,
        }
    }

    pub fn as_blocks(&self) -> Option<&[DMatrix<f64>]> {
        match self {
            StackedValues::Blocks(b) => Some(b),
            StackedValues::Rows(_) => None,
        }
    }
}

/// Values of one entity for one step time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet<E: ResultEntity> {
    pub entity: E,
    /// Components per value, i.e. 3 for displacements
    pub no_components: usize,
    /// Time, load factor, frequency or buckling factor, depending on the analysis
    pub step_time: f64,
    pub step_no: u32,
    /// Increment within the step; mode number in frequency and buckling steps
    pub step_increment_no: u32,
    pub analysis_type: AnalysisType,
    /// Node or element set the values are restricted to, empty for the whole model
    pub set_name: String,
    pub component_names: Vec<String>,
    pub entity_location: ResultLocation,
    values: ResultValues,
}

impl<E: ResultEntity> ResultSet<E> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entity: E,
        step_time: f64,
        step_no: u32,
        step_increment_no: u32,
        analysis_type: AnalysisType,
        set_name: String,
        component_names: Vec<String>,
        values: ResultValues,
        no_components: usize,
    ) -> Self {
        Self {
            entity,
            no_components,
            step_time,
            step_no,
            step_increment_no,
            analysis_type,
            set_name,
            component_names,
            entity_location: entity.location(),
            values,
        }
    }

    pub fn values(&self) -> &ResultValues {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.values.ids()
    }

    /// Component vector of a nodal or element id.
    pub fn vector(&self, id: u32) -> Option<&DVector<f64>> {
        match &self.values {
            ResultValues::Vectors(map) => map.get(&id),
            ResultValues::IntegrationPoints(_) => None,
        }
    }

    /// Integration point matrix of an element id.
    pub fn matrix(&self, id: u32) -> Option<&DMatrix<f64>> {
        match &self.values {
            ResultValues::IntegrationPoints(map) => map.get(&id),
            ResultValues::Vectors(_) => None,
        }
    }

    /// Stacks the values of `ids` in the given order.
    ///
    /// Nodal and element sets give an (ids x components) matrix, integration
    /// point sets one block per id. An id without values either fails with
    /// [`ResultError::MissingId`] (`.dat` sets) or is filled with zeros
    /// (`.frd` sets), see [`ResultEntity::MISSING_IDS`].
    pub fn get_values_by_ids(&self, ids: &[u32]) -> Result<StackedValues> {
        match &self.values {
            ResultValues::Vectors(map) => {
                let zeros = DVector::zeros(self.no_components);
                let rows = ids
                    .iter()
                    .map(|id| match map.get(id) {
                        Some(v) => Ok(v),
                        None => self.missing(*id).map(|_| &zeros),
                    })
                    .collect::<Result<Vec<_>>>()?;
                let stacked =
                    DMatrix::from_fn(rows.len(), self.no_components, |r, c| rows[r][c]);
                Ok(StackedValues::Rows(stacked))
            }
            ResultValues::IntegrationPoints(map) => {
                let no_int_pnts = map.values().next().map_or(1, |m| m.nrows());
                let blocks = ids
                    .iter()
                    .map(|id| match map.get(id) {
                        Some(m) => Ok(m.clone()),
                        None => self
                            .missing(*id)
                            .map(|_| DMatrix::zeros(no_int_pnts, self.no_components)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(StackedValues::Blocks(blocks))
            }
        }
    }

    fn missing(&self, id: u32) -> Result<()> {
        match E::MISSING_IDS {
            MissingIds::Error => Err(ResultError::MissingId(id)),
            MissingIds::Zeros => Ok(()),
        }
    }
}

/// Filter for [`ResultFile::get_result_sets_by`]. Unset fields match
/// everything.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultQuery<E> {
    entity: Option<E>,
    step_no: Option<u32>,
    step_increment_no: Option<u32>,
    analysis_type: Option<AnalysisType>,
    set_name: Option<String>,
    step_time: Option<f64>,
}

impl<E> Default for ResultQuery<E> {
    fn default() -> Self {
        Self {
            entity: None,
            step_no: None,
            step_increment_no: None,
            analysis_type: None,
            set_name: None,
            step_time: None,
        }
    }
}

impl<E> ResultQuery<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: E) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn step_no(mut self, step_no: u32) -> Self {
        self.step_no = Some(step_no);
        self
    }

    pub fn step_increment_no(mut self, step_increment_no: u32) -> Self {
        self.step_increment_no = Some(step_increment_no);
        self
    }

    pub fn analysis_type(mut self, analysis_type: AnalysisType) -> Self {
        self.analysis_type = Some(analysis_type);
        self
    }

    pub fn set_name(mut self, set_name: impl Into<String>) -> Self {
        self.set_name = Some(set_name.into());
        self
    }

    /// Matches the sets at the available time closest to `step_time`.
    pub fn step_time(mut self, step_time: f64) -> Self {
        self.step_time = Some(step_time);
        self
    }
}

/// Content of one parsed result file.
///
/// Don't construct this directly; use [`DatResult::from_file`] or
/// [`FrdResult::from_file`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultFile<E: ResultEntity> {
    step_times: Vec<f64>,
    result_sets: Vec<ResultSet<E>>,
    step_infos: BTreeMap<u32, StepInfo>,
}

/// Content of a `.dat` file.
pub type DatResult = ResultFile<DatEntity>;
/// Content of a `.frd` file.
pub type FrdResult = ResultFile<FrdEntity>;

impl<E: ResultEntity> ResultFile<E> {
    pub(crate) fn new(result_sets: Vec<ResultSet<E>>, step_infos: BTreeMap<u32, StepInfo>) -> Self {
        let mut step_times: Vec<f64> = result_sets.iter().map(|rs| rs.step_time).collect();
        step_times.sort_by(f64::total_cmp);
        step_times.dedup();
        Self {
            step_times,
            result_sets,
            step_infos,
        }
    }

    pub fn result_sets(&self) -> &[ResultSet<E>] {
        &self.result_sets
    }

    /// Sorted, distinct step times of all result sets.
    pub fn get_available_times(&self) -> &[f64] {
        &self.step_times
    }

    /// Returns the result sets matching every field set in `query`.
    ///
    /// Exact-match filters are applied first. A step time filter is applied
    /// last and matches the available time nearest to the requested one, so
    /// a time outside the available range selects the first or last time.
    /// Nothing matching gives an empty vector.
    pub fn get_result_sets_by(&self, query: &ResultQuery<E>) -> Vec<&ResultSet<E>> {
        let mut sets: Vec<&ResultSet<E>> = self.result_sets.iter().collect();

        if let Some(entity) = query.entity {
            sets.retain(|rs| rs.entity == entity);
        }
        if let Some(step_no) = query.step_no {
            sets.retain(|rs| rs.step_no == step_no);
        }
        if let Some(inc) = query.step_increment_no {
            sets.retain(|rs| rs.step_increment_no == inc);
        }
        if let Some(analysis_type) = query.analysis_type {
            sets.retain(|rs| rs.analysis_type == analysis_type);
        }
        if let Some(set_name) = &query.set_name {
            sets.retain(|rs| &rs.set_name == set_name);
        }
        if let Some(step_time) = query.step_time {
            match self.nearest_time(step_time) {
                Some(nearest) => sets.retain(|rs| rs.step_time == nearest),
                None => sets.clear(),
            }
        }
        sets
    }

    pub fn get_result_sets_by_entity(&self, entity: E) -> Vec<&ResultSet<E>> {
        self.get_result_sets_by(&ResultQuery::new().entity(entity))
    }

    /// Result set of `entity` at the available time closest to `step_time`.
    ///
    /// If several sets share entity and time, the one named `set_name` is
    /// returned, or the first one when no name is given.
    pub fn get_result_set_by_entity_and_time(
        &self,
        entity: E,
        step_time: f64,
        set_name: Option<&str>,
    ) -> Option<&ResultSet<E>> {
        let sets = self.get_result_sets_by(&ResultQuery::new().entity(entity).step_time(step_time));
        pick_by_set_name(sets, set_name)
    }

    /// Result set of `entity` at `get_available_times()[index]`. Negative
    /// indices count from the end.
    pub fn get_result_set_by_entity_and_index(
        &self,
        entity: E,
        index: isize,
        set_name: Option<&str>,
    ) -> Option<&ResultSet<E>> {
        let len = self.step_times.len() as isize;
        let index = if index < 0 { len + index } else { index };
        if !(0..len).contains(&index) {
            return None;
        }
        let step_time = self.step_times[index as usize];
        let sets: Vec<_> = self
            .get_result_sets_by_entity(entity)
            .into_iter()
            .filter(|rs| rs.step_time == step_time)
            .collect();
        pick_by_set_name(sets, set_name)
    }

    fn nearest_time(&self, step_time: f64) -> Option<f64> {
        // ties resolve to the smaller time
        self.step_times.iter().copied().fold(None, |best, t| match best {
            Some(b) if (b - step_time).abs() <= (t - step_time).abs() => Some(b),
            _ => Some(t),
        })
    }
}

impl ResultFile<DatEntity> {
    /// Eigenvalue or buckling metadata of a step, if it has any.
    pub fn get_step_info(&self, step_no: u32) -> Option<&StepInfo> {
        self.step_infos.get(&step_no)
    }

    pub fn step_infos(&self) -> impl Iterator<Item = &StepInfo> {
        self.step_infos.values()
    }
}

fn pick_by_set_name<'a, E: ResultEntity>(
    sets: Vec<&'a ResultSet<E>>,
    set_name: Option<&str>,
) -> Option<&'a ResultSet<E>> {
    match set_name {
        Some(name) => sets.into_iter().find(|rs| rs.set_name == name),
        None => sets.into_iter().next(),
    }
}

/// Per-block accumulator used by the readers while a result block is open.
#[derive(Debug)]
pub(crate) struct ValuesBuilder {
    location: ResultLocation,
    rows: BTreeMap<u32, Vec<Vec<f64>>>,
    last_id: Option<u32>,
}

impl ValuesBuilder {
    pub(crate) fn new(location: ResultLocation) -> Self {
        Self {
            location,
            rows: BTreeMap::new(),
            last_id: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn push_row(&mut self, id: u32, row: Vec<f64>) {
        self.rows.entry(id).or_default().push(row);
        self.last_id = Some(id);
    }

    /// Appends components to the last row pushed. Returns false if no row
    /// has been pushed yet.
    pub(crate) fn extend_last(&mut self, components: &[f64]) -> bool {
        let Some(id) = self.last_id else {
            return false;
        };
        match self.rows.get_mut(&id).and_then(|rows| rows.last_mut()) {
            Some(row) => {
                row.extend_from_slice(components);
                true
            }
            None => false,
        }
    }

    /// Converts the accumulated rows into immutable values and the component
    /// count. Fails if the rows of the block differ in width.
    pub(crate) fn finish(self) -> std::result::Result<(ResultValues, usize), String> {
        let no_components = self
            .rows
            .values()
            .next()
            .and_then(|rows| rows.first())
            .map_or(0, Vec::len);

        for (id, rows) in &self.rows {
            if let Some(row) = rows.iter().find(|r| r.len() != no_components) {
                return Err(format!(
                    "id {id} has {} components, expected {no_components}",
                    row.len()
                ));
            }
        }

        let values = match self.location {
            ResultLocation::IntegrationPoint => ResultValues::IntegrationPoints(
                self.rows
                    .into_iter()
                    .map(|(id, rows)| {
                        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
                        (id, DMatrix::from_row_slice(rows.len(), no_components, &flat))
                    })
                    .collect(),
            ),
            ResultLocation::Nodal | ResultLocation::Element => ResultValues::Vectors(
                self.rows
                    .into_iter()
                    .map(|(id, rows)| {
                        // repeated rows of a nodal id keep the first occurrence
                        let first = rows.into_iter().next().unwrap_or_default();
                        (id, DVector::from_vec(first))
                    })
                    .collect(),
            ),
        };
        Ok((values, no_components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dat_set(entity: DatEntity, step_time: f64) -> ResultSet<DatEntity> {
        let mut builder = ValuesBuilder::new(entity.location());
        builder.push_row(1, vec![1.0, 2.0, 3.0]);
        builder.push_row(3, vec![3.0, 3.0, 3.0]);
        builder.push_row(5, vec![5.0, 0.0, -5.0]);
        let (values, no_components) = builder.finish().expect("consistent rows");
        ResultSet::new(
            entity,
            step_time,
            1,
            1,
            AnalysisType::Static,
            String::new(),
            vec!["vx".into(), "vy".into(), "vz".into()],
            values,
            no_components,
        )
    }

    fn sample_file() -> DatResult {
        ResultFile::new(
            vec![
                dat_set(DatEntity::U, 0.34),
                dat_set(DatEntity::U, 0.68),
                dat_set(DatEntity::U, 1.0),
                dat_set(DatEntity::RF, 1.0),
            ],
            BTreeMap::new(),
        )
    }

    #[test]
    fn available_times_are_sorted_and_distinct() {
        let file = sample_file();
        assert_eq!(file.get_available_times(), &[0.34, 0.68, 1.0]);
    }

    #[test]
    fn empty_query_returns_everything() {
        let file = sample_file();
        let sets = file.get_result_sets_by(&ResultQuery::new());
        assert_eq!(sets.len(), file.result_sets().len());
    }

    #[test]
    fn step_time_filter_uses_nearest_available_time() {
        let file = sample_file();
        let exact = file.get_result_sets_by(&ResultQuery::new().step_time(0.68));
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].step_time, 0.68);

        let below = file.get_result_sets_by(&ResultQuery::new().step_time(-100.0));
        assert!(below.iter().all(|rs| rs.step_time == 0.34));
        assert_eq!(below.len(), 1);

        let above = file.get_result_sets_by(&ResultQuery::new().step_time(100.0));
        assert_eq!(above.len(), 2);
        assert!(above.iter().all(|rs| rs.step_time == 1.0));
    }

    #[test]
    fn unmatched_filters_give_empty_result() {
        let file = sample_file();
        assert!(file.get_result_sets_by(&ResultQuery::new().entity(DatEntity::CDIS)).is_empty());
        assert!(file.get_result_sets_by(&ResultQuery::new().set_name("NOPE")).is_empty());
        assert!(file
            .get_result_sets_by(&ResultQuery::new().analysis_type(AnalysisType::Frequency))
            .is_empty());
    }

    #[test]
    fn values_are_stacked_in_request_order() {
        let file = sample_file();
        let rs = &file.result_sets()[0];
        let stacked = rs.get_values_by_ids(&[5, 1, 3]).unwrap().into_rows().unwrap();
        assert_eq!(stacked.shape(), (3, 3));
        assert_eq!(stacked.row(0).iter().copied().collect::<Vec<_>>(), vec![5.0, 0.0, -5.0]);
        assert_eq!(stacked.row(1).iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn dat_sets_reject_unknown_ids() {
        let file = sample_file();
        let err = file.result_sets()[0].get_values_by_ids(&[1, 42]).unwrap_err();
        assert!(matches!(err, ResultError::MissingId(42)));
    }

    #[test]
    fn index_lookup_counts_from_the_end() {
        let file = sample_file();
        let last = file.get_result_set_by_entity_and_index(DatEntity::U, -1, None).unwrap();
        assert_eq!(last.step_time, 1.0);
        let first = file.get_result_set_by_entity_and_index(DatEntity::U, 0, None).unwrap();
        assert_eq!(first.step_time, 0.34);
        assert!(file.get_result_set_by_entity_and_index(DatEntity::U, 3, None).is_none());
        assert!(file.get_result_set_by_entity_and_index(DatEntity::CDIS, 0, None).is_none());
    }

    #[test]
    fn time_lookup_picks_nearest() {
        let file = sample_file();
        let rs = file.get_result_set_by_entity_and_time(DatEntity::U, 0.5, None).unwrap();
        assert_eq!(rs.step_time, 0.34);
        let rs = file.get_result_set_by_entity_and_time(DatEntity::U, 0.0, None).unwrap();
        assert_eq!(rs.step_time, 0.34);
        assert!(file.get_result_set_by_entity_and_time(DatEntity::U, 1.0, Some("X")).is_none());
    }

    #[test]
    fn builder_rejects_ragged_rows() {
        let mut builder = ValuesBuilder::new(ResultLocation::Nodal);
        builder.push_row(1, vec![1.0, 2.0]);
        builder.push_row(2, vec![1.0]);
        assert!(builder.finish().is_err());
    }

    #[test]
    fn builder_groups_integration_points() {
        let mut builder = ValuesBuilder::new(ResultLocation::IntegrationPoint);
        builder.push_row(7, vec![1.0, 2.0]);
        builder.push_row(7, vec![3.0, 4.0]);
        builder.push_row(8, vec![5.0, 6.0]);
        let (values, no_components) = builder.finish().unwrap();
        assert_eq!(no_components, 2);
        let ResultValues::IntegrationPoints(map) = values else {
            panic!("expected integration point values");
        };
        assert_eq!(map[&7].shape(), (2, 2));
        assert_eq!(map[&7][(1, 0)], 3.0);
        assert_eq!(map[&8].shape(), (1, 2));
    }
}
