use cobot_lib::{
    Cobot3dIk, Connector, Endpoint, HandFrame, HandMapper, HandPose, JointAngles, LinkStatus,
    PoseStreamer, TargetPose, TeleopConfig, TickOutcome,
};
use eyre::Result;
use nalgebra::Vector3;
use tracing::{debug, info};

/// Per-tick glue between hand tracking, the IK solver and the pose link.
pub struct HandTeleop<C: Connector> {
    ik: Cobot3dIk,
    base: Vector3<f64>,
    mapper: HandMapper,
    streamer: PoseStreamer<C>,
    pose: HandPose,
    pending_frame: Option<HandFrame>,
    target: Option<TargetPose>,
    last_status: Option<LinkStatus>,
}

impl<C: Connector> HandTeleop<C> {
    pub fn new(config: &TeleopConfig, streamer: PoseStreamer<C>) -> Result<Self> {
        let geometry = config.geometry()?;
        info!(
            "Arm geometry: A23={} A34={} (reach {:.0}..{:.0})",
            geometry.a23(),
            geometry.a34(),
            geometry.min_reach(),
            geometry.max_reach()
        );

        Ok(Self {
            ik: Cobot3dIk::new(geometry),
            base: config.base_position(),
            mapper: HandMapper::new(config.hand.clone()),
            streamer,
            pose: HandPose::None,
            pending_frame: None,
            target: None,
            last_status: None,
        })
    }

    pub fn streamer(&self) -> &PoseStreamer<C> {
        &self.streamer
    }

    pub fn streamer_mut(&mut self) -> &mut PoseStreamer<C> {
        &mut self.streamer
    }

    pub fn set_pose(&mut self, pose: HandPose) {
        if pose != self.pose {
            debug!("Hand pose: {}", pose);
        }
        self.pose = pose;
    }

    /// Keeps the newest frame; it is consumed on the next tick.
    pub fn set_frame(&mut self, frame: HandFrame) {
        self.pending_frame = Some(frame);
    }

    pub fn recenter(&mut self) -> bool {
        let done = self.mapper.recenter();
        if done {
            info!("Hand offset recentered");
        }
        done
    }

    pub fn toggle_enabled(&mut self) -> bool {
        self.streamer.toggle_enabled()
    }

    pub fn set_endpoint(&mut self, endpoint: Endpoint) {
        self.streamer.set_endpoint(endpoint);
        // configuration problems show up in the link status
        let _ = self.streamer.connect();
    }

    /// One control tick. Returns the joint angles when there is a target.
    ///
    /// Without a tracked hand the last target is held.
    pub fn tick(&mut self) -> Option<(JointAngles, TickOutcome)> {
        if let Some(frame) = self.pending_frame.take() {
            if let Some(target) = self.mapper.map(&frame) {
                self.target = Some(target);
            }
        }

        let Some(target) = self.target else {
            self.streamer.poll();
            return None;
        };

        let solution = self.ik.solve(&self.base, &target.position);
        let angles = solution.joint_angles();
        let outcome = self.streamer.tick(self.pose, &angles);
        Some((angles, outcome))
    }

    /// Link status, only when it differs from the last one returned.
    pub fn status_change(&mut self) -> Option<LinkStatus> {
        let status = self.streamer.link_status();
        if self.last_status.as_ref() == Some(&status) {
            return None;
        }
        self.last_status = Some(status.clone());
        Some(status)
    }

    pub fn shutdown(&mut self) {
        self.streamer.close();
    }
}

/// Parses a gesture input: either a bare label or a JSON string.
pub fn parse_pose(bytes: &[u8]) -> Result<HandPose> {
    if let Ok(pose) = serde_json::from_slice::<HandPose>(bytes) {
        return Ok(pose);
    }
    let text = std::str::from_utf8(bytes)?;
    text.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobot_lib::{HandSample, StreamerSettings, TcpConnector};

    fn teleop() -> HandTeleop<TcpConnector> {
        let config = TeleopConfig::default();
        // empty host: nothing ever leaves the process
        let streamer = PoseStreamer::new(
            TcpConnector::default(),
            StreamerSettings::from_config(&config.link),
        );
        HandTeleop::new(&config, streamer).unwrap()
    }

    #[test]
    fn test_no_target_before_first_hand() {
        let mut teleop = teleop();
        assert!(teleop.tick().is_none());

        teleop.set_frame(HandFrame::default());
        assert!(teleop.tick().is_none());
    }

    #[test]
    fn test_tick_solves_and_holds_target() {
        let mut teleop = teleop();
        teleop.set_frame(HandFrame {
            right: Some(HandSample::new(0.0, 0.4, 0.2)),
            left: None,
        });

        let (angles, outcome) = teleop.tick().unwrap();
        assert!(angles.is_finite());
        assert_eq!(angles.base, 0.0);
        assert_eq!(outcome, TickOutcome::NotConnected);

        // hand lost: same target, same angles
        let (held, _) = teleop.tick().unwrap();
        assert_eq!(held, angles);
    }

    #[test]
    fn test_invalid_endpoint_reported_in_status() {
        let mut teleop = teleop();
        teleop.set_endpoint(Endpoint::new("127.0.0.1", 4242));

        let status = teleop.status_change().unwrap();
        assert!(status.message.contains("Please select a valid port!"));
        assert!(teleop.status_change().is_none());
    }

    #[test]
    fn test_parse_pose_inputs() {
        assert_eq!(parse_pose(b"Fist").unwrap(), HandPose::Fist);
        assert_eq!(parse_pose(b"\"OK\"").unwrap(), HandPose::Ok);
        assert_eq!(parse_pose(b" Point\n").unwrap(), HandPose::Point);
        assert!(parse_pose(b"Wave").is_err());
    }
}
