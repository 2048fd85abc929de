/// Everything the task tree reads and mutates, passed explicitly into every
/// advance. No task reaches outside this struct.
struct StageWorld {
    replay: ReplaySession,
    boss: Boss,
    player: PlayerState,
    bullets: Vec<MotionRef>,
    score: ScoreBoard,
    events: StageEventBus,
}

impl StageWorld {
    fn new(replay: ReplaySession, boss: Boss, score: ScoreBoard) -> Self {
        Self {
            replay,
            boss,
            player: PlayerState::new(),
            bullets: Vec::new(),
            score,
            events: StageEventBus::default(),
        }
    }

    fn spawn_bullet(&mut self, motion: Motion) -> MotionRef {
        let bullet: MotionRef = std::rc::Rc::new(std::cell::RefCell::new(motion));
        self.bullets.push(std::rc::Rc::clone(&bullet));
        bullet
    }

    fn clear_bullets(&mut self) {
        let cleared = self.bullets.len();
        self.bullets.clear();
        if cleared > 0 {
            debug!(cleared, "bullets_cleared");
        }
    }

    /// One movement step for every live bullet, plus offscreen culling.
    fn integrate_bullets(&mut self) {
        for bullet in &self.bullets {
            bullet.borrow_mut().integrate();
        }
        self.bullets.retain(|bullet| {
            let position = bullet.borrow().position;
            position.x.abs() <= PLAYFIELD_HALF_WIDTH + BULLET_CULL_MARGIN
                && position.y.abs() <= PLAYFIELD_HALF_HEIGHT + BULLET_CULL_MARGIN
        });
    }

    /// Held-input movement, shooting and bombing, identical in recording and
    /// playback because both read through the replay session.
    fn step_player(&mut self) {
        let mut direction = Vec2::ZERO;
        if self.replay.is_pressed(InputCode::MoveRight) {
            direction.x += 1.0;
        }
        if self.replay.is_pressed(InputCode::MoveLeft) {
            direction.x -= 1.0;
        }
        if self.replay.is_pressed(InputCode::MoveUp) {
            direction.y += 1.0;
        }
        if self.replay.is_pressed(InputCode::MoveDown) {
            direction.y -= 1.0;
        }

        let length = direction.length();
        if length > 0.0 {
            let mut speed = PLAYER_SPEED_UNITS_PER_FRAME;
            if self.replay.is_pressed(InputCode::Slow) {
                speed *= PLAYER_SLOW_MULTIPLIER;
            }
            self.player.position += direction * (speed / length);
        }
        self.player.position.x = self
            .player
            .position
            .x
            .clamp(-PLAYFIELD_HALF_WIDTH, PLAYFIELD_HALF_WIDTH);
        self.player.position.y = self
            .player
            .position
            .y
            .clamp(-PLAYFIELD_HALF_HEIGHT, PLAYFIELD_HALF_HEIGHT);

        if self.replay.is_pressed(InputCode::Shoot) {
            self.boss.damage(PLAYER_SHOT_DAMAGE_PER_FRAME);
        }
        if self.replay.is_just_pressed(InputCode::Bomb) && self.player.use_bomb(&mut self.events) {
            self.clear_bullets();
        }
    }
}
