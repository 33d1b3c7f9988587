// Dashboard aggregation: critical tier first, secondary tier progressively.
// Every write into the published view is a field-level merge guarded by the
// load's generation ticket.

use tokio::sync::watch;

use crate::attendance::{AttendanceCalendar, CourseAttendance, LeaveRecord, RawAttendanceDay};
use crate::error::{DashboardError, PageError};
use crate::generation::{Generation, Ticket};
use crate::types::{
    AcademicContext, AcademicPercentageRecord, DashboardStats, ExamEligibility, FamilyDetails,
    FieldFailure, PersonalDetails, ProfileView, Readiness,
};
use crate::upstream::{Fetch, Listing, Resource, StudentIdentity, UpstreamClient, UpstreamError};

/// Calls that need the academic filter ids before they can be issued.
const ACADEMIC_DEPENDENTS: &[Resource] = &[
    Resource::ExamEligibility,
    Resource::DailyAttendance,
    Resource::LeaveStatus,
    Resource::CourseAttendance,
];

/// Fold one outcome into the view. `Empty` and `Failed` both leave the field
/// absent; only `Failed` is recorded.
fn apply<T>(
    view: &mut ProfileView,
    resource: Resource,
    fetched: Fetch<T>,
    place: impl FnOnce(&mut ProfileView, T),
) {
    view.settled.insert(resource);
    match fetched {
        Fetch::Ok(value) => place(view, value),
        Fetch::Empty => {}
        Fetch::Failed(err) => record_failure(view, resource, &err),
    }
}

/// Failures stay ordered by resource so the view does not depend on the
/// order calls happened to settle in.
fn record_failure(view: &mut ProfileView, resource: Resource, err: &UpstreamError) {
    view.failures.retain(|f| f.resource != resource);
    let at = view.failures.partition_point(|f| f.resource < resource);
    view.failures.insert(at, FieldFailure::new(resource, err));
}

pub struct DashboardAggregator {
    client: UpstreamClient,
    generation: Generation,
    view: watch::Sender<ProfileView>,
}

impl DashboardAggregator {
    pub fn new(client: UpstreamClient) -> Self {
        let (view, _) = watch::channel(ProfileView::default());
        Self {
            client,
            generation: Generation::new(),
            view,
        }
    }

    /// Receive every published revision of the view.
    pub fn subscribe(&self) -> watch::Receiver<ProfileView> {
        self.view.subscribe()
    }

    pub fn snapshot(&self) -> ProfileView {
        self.view.borrow().clone()
    }

    /// Identity changed or the user signed out. In-flight results are
    /// dropped and the view goes back to an empty `Loading` state.
    pub fn invalidate(&self) {
        self.generation.invalidate();
        self.view.send_replace(ProfileView::default());
        log::info!("dashboard: view invalidated");
    }

    /// Write into the view only while `ticket` is current.
    fn publish(&self, ticket: &Ticket, update: impl FnOnce(&mut ProfileView)) -> bool {
        if !ticket.is_current() {
            log::debug!("dashboard: dropping result from stale load {}", ticket.id());
            return false;
        }
        self.view.send_modify(update);
        true
    }

    fn settle<T>(
        &self,
        ticket: &Ticket,
        resource: Resource,
        fetched: Fetch<T>,
        place: impl FnOnce(&mut ProfileView, T),
    ) {
        self.publish(ticket, |view| apply(view, resource, fetched, place));
    }

    /// Load both tiers for `identity`.
    pub async fn load(&self, identity: &StudentIdentity) -> Result<(), DashboardError> {
        self.load_critical(identity).await?.run().await
    }

    /// Issue the critical calls concurrently and wait for all of them.
    ///
    /// The view becomes `Ready` as soon as they settle, unless every one of
    /// them failed, in which case the view carries a single page-level error.
    /// The returned tier is not started; call [`SecondaryTier::run`].
    pub async fn load_critical<'a>(
        &'a self,
        identity: &'a StudentIdentity,
    ) -> Result<SecondaryTier<'a>, DashboardError> {
        let ticket = self.generation.begin();
        self.view.send_replace(ProfileView::default());
        log::info!(
            "dashboard: load {} started for {} ({})",
            ticket.id(),
            identity.short_key(),
            identity.institution()
        );

        let (personal, stats) = tokio::join!(
            self.client
                .get_json::<PersonalDetails>(Resource::PersonalProfile, identity, &[]),
            self.client
                .get_json::<DashboardStats>(Resource::DashboardStats, identity, &[]),
        );

        if !ticket.is_current() {
            return Err(DashboardError::Superseded);
        }

        if personal.is_failed() && stats.is_failed() {
            let failures: Vec<&UpstreamError> =
                [personal.failure(), stats.failure()].into_iter().flatten().collect();
            let err = DashboardError::from_critical_failures(&failures);
            let page = PageError::from(&err);
            log::warn!("dashboard: every critical call failed: {}", err);

            self.publish(&ticket, |view| {
                for (resource, failure) in [
                    (Resource::PersonalProfile, personal.failure()),
                    (Resource::DashboardStats, stats.failure()),
                ] {
                    view.settled.insert(resource);
                    if let Some(failure) = failure {
                        record_failure(view, resource, failure);
                    }
                }
                view.readiness = Readiness::Unreachable { error: page };
            });
            return Err(err);
        }

        self.publish(&ticket, |view| {
            apply(view, Resource::PersonalProfile, personal, |v, p| v.personal = Some(p));
            apply(view, Resource::DashboardStats, stats, |v, s| v.stats = Some(s));
            view.readiness = Readiness::Ready;
        });
        log::info!("dashboard: load {} ready", ticket.id());

        Ok(SecondaryTier {
            aggregator: self,
            identity,
            ticket,
        })
    }
}

/// The background tier of one load. Each call publishes its own field as it
/// resolves; nothing here can make the view unready again.
pub struct SecondaryTier<'a> {
    aggregator: &'a DashboardAggregator,
    identity: &'a StudentIdentity,
    ticket: Ticket,
}

impl SecondaryTier<'_> {
    pub async fn run(self) -> Result<(), DashboardError> {
        let agg = self.aggregator;
        let client = &agg.client;
        let identity = self.identity;
        let ticket = &self.ticket;

        let percentages = async {
            let fetched = client
                .get_json::<Listing<AcademicPercentageRecord>>(
                    Resource::AcademicPercentages,
                    identity,
                    &[],
                )
                .await
                .map(Listing::into_vec);
            agg.settle(ticket, Resource::AcademicPercentages, fetched, |v, records| {
                v.percentages = Some(records)
            });
        };

        let family = async {
            let fetched = client
                .get_json::<FamilyDetails>(Resource::FamilyDetails, identity, &[])
                .await;
            agg.settle(ticket, Resource::FamilyDetails, fetched, |v, family| {
                v.family = Some(family)
            });
        };

        let academic_chain = async {
            let fetched = client
                .get_json::<AcademicContext>(Resource::AcademicContext, identity, &[])
                .await;
            let academic = match &fetched {
                Fetch::Ok(academic) if academic.has_filter_ids() => Some(academic.clone()),
                _ => None,
            };
            agg.settle(ticket, Resource::AcademicContext, fetched, |v, academic| {
                v.academic = Some(academic)
            });

            match academic {
                Some(academic) => self.load_dependents(&academic).await,
                None => {
                    log::info!("dashboard: no academic filter ids; attendance sections stay empty");
                    agg.publish(ticket, |view| {
                        view.settled.extend(ACADEMIC_DEPENDENTS.iter().copied());
                    });
                }
            }
        };

        tokio::join!(percentages, family, academic_chain);

        if !ticket.is_current() {
            return Err(DashboardError::Superseded);
        }
        let view = agg.view.borrow();
        log::info!(
            "dashboard: load {} settled ({} failed calls)",
            ticket.id(),
            view.failures.len()
        );
        Ok(())
    }

    async fn load_dependents(&self, academic: &AcademicContext) {
        let agg = self.aggregator;
        let client = &agg.client;
        let identity = self.identity;
        let ticket = &self.ticket;
        let filters = academic.filter_params();
        let exam_filters = academic.exam_params();

        let eligibility = async {
            let fetched = client
                .get_json::<ExamEligibility>(Resource::ExamEligibility, identity, &exam_filters)
                .await;
            agg.settle(ticket, Resource::ExamEligibility, fetched, |v, e| {
                v.merge_eligibility(e)
            });
        };

        let daily = async {
            let fetched = client
                .get_json::<Listing<RawAttendanceDay>>(Resource::DailyAttendance, identity, &filters)
                .await
                .map(|items| AttendanceCalendar::from_raw(items.into_vec()));
            agg.settle(ticket, Resource::DailyAttendance, fetched, |v, calendar| {
                v.attendance = Some(calendar)
            });
        };

        let leaves = async {
            let fetched = client
                .get_json::<Listing<LeaveRecord>>(Resource::LeaveStatus, identity, &filters)
                .await
                .map(Listing::into_vec);
            agg.settle(ticket, Resource::LeaveStatus, fetched, |v, leaves| {
                v.leaves = Some(leaves)
            });
        };

        let courses = async {
            let fetched = client
                .get_json::<Listing<CourseAttendance>>(Resource::CourseAttendance, identity, &filters)
                .await
                .map(Listing::into_vec);
            agg.settle(ticket, Resource::CourseAttendance, fetched, |v, courses| {
                v.courses = Some(courses)
            });
        };

        tokio::join!(eligibility, daily, leaves, courses);
    }
}
